use anyhow::Result;
use calsync_core::config::{CalsyncConfig, EndpointConfig};
use calsync_core::provider::Session;
use calsync_core::retry::RetryPolicy;
use calsync_core::store::FileMappingStore;
use calsync_core::sync::{CycleContext, SyncResult, TracingSink, run_cycle};
use calsync_core::window::SyncWindow;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::render::{Render, RenderVerbose};
use crate::utils::tui;

#[derive(Serialize)]
struct DirectionReport {
    from: String,
    to: String,
    result: SyncResult,
}

pub async fn run(
    config: &CalsyncConfig,
    window: SyncWindow,
    bidirectional: bool,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let source = config.source()?;
    let destination = config.destination()?;

    let source_session = super::open_session(source).await?;
    let destination_session = super::open_session(destination).await?;

    let mut directions = vec![(source, &source_session, destination, &destination_session)];
    if bidirectional {
        directions.push((destination, &destination_session, source, &source_session));
    }

    let mut reports = Vec::new();

    for (i, (from, from_session, to, to_session)) in directions.into_iter().enumerate() {
        let label = format!("{} → {}", from.render(), to);
        let spinner = tui::create_spinner(label.clone());
        let result = sync_direction(config, window, from, from_session, to, to_session).await;
        spinner.finish_and_clear();

        let result = result?;
        if !json {
            if i > 0 {
                println!();
            }
            println!("{label}");
            println!("{}", result.render(verbose));
        }

        let aborted = result.is_aborted();
        reports.push(DirectionReport {
            from: from.to_string(),
            to: to.to_string(),
            result,
        });

        // Sessions are shared between directions; no point going on
        if aborted {
            break;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }

    if let Some(abort) = reports.iter().find_map(|r| r.result.aborted.as_ref()) {
        anyhow::bail!("Sync {abort}");
    }

    Ok(())
}

async fn sync_direction(
    config: &CalsyncConfig,
    window: SyncWindow,
    from: &EndpointConfig,
    from_session: &Session,
    to: &EndpointConfig,
    to_session: &Session,
) -> Result<SyncResult> {
    let source = from.provider();
    let destination = to.provider();
    let own_copies = super::own_copies(config, from, to)?;
    let mut store = FileMappingStore::open(&config.store_path(from, to))?;
    tracing::info!(
        from = %from,
        to = %to,
        store = %store.path().display(),
        own_copies = own_copies.len(),
        "starting cycle"
    );

    let context = CycleContext {
        source: &source,
        source_session: from_session,
        destination: &destination,
        destination_session: to_session,
        window,
        retry: RetryPolicy::default(),
        sink: &TracingSink,
        own_copies,
    };

    Ok(run_cycle(&context, &mut store).await?)
}

fn print_summary(reports: &[DirectionReport]) {
    let created: usize = reports.iter().map(|r| r.result.created.len()).sum();
    let updated: usize = reports.iter().map(|r| r.result.updated.len()).sum();
    let failed: usize = reports.iter().map(|r| r.result.failed.len()).sum();

    if created > 0 || updated > 0 {
        println!("\nSynced: {created} created, {updated} updated");
    }

    if failed > 0 {
        println!(
            "{}",
            format!("{failed} failed; they will be retried on the next sync").red()
        );
    }
}
