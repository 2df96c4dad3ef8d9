use anyhow::Result;
use calsync_core::config::CalsyncConfig;
use calsync_core::retry::RetryPolicy;
use calsync_core::store::FileMappingStore;
use calsync_core::sync::{CycleContext, NullSink, preview_cycle};
use calsync_core::window::SyncWindow;
use owo_colors::OwoColorize;

use crate::render::{Render, RenderVerbose};
use crate::utils::tui;

pub async fn run(
    config: &CalsyncConfig,
    window: SyncWindow,
    bidirectional: bool,
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

    for (i, (from, from_session, to, to_session)) in directions.into_iter().enumerate() {
        let label = format!("{} → {}", from.render(), to);
        let own_copies = super::own_copies(config, from, to)?;
        let store = FileMappingStore::open(&config.store_path(from, to))?;
        let source_provider = from.provider();
        let destination_provider = to.provider();

        let context = CycleContext {
            source: &source_provider,
            source_session: from_session,
            destination: &destination_provider,
            destination_session: to_session,
            window,
            retry: RetryPolicy::default(),
            sink: &NullSink,
            own_copies,
        };

        let spinner = tui::create_spinner(label.clone());
        let result = preview_cycle(&context, &store).await;
        spinner.finish_and_clear();

        if i > 0 {
            println!();
        }
        println!("{label}");

        match result {
            Ok(preview) => {
                println!("{}", preview.plan.render(verbose));
                if !preview.rejected.is_empty() {
                    println!(
                        "   {}",
                        format!("{} malformed events ignored", preview.rejected.len()).dimmed()
                    );
                }
                let (_, _, unchanged) = preview.plan.counts();
                if unchanged > 0 {
                    println!("   {}", format!("{unchanged} already in sync").dimmed());
                }
            }
            Err(e) => println!("   {}", e.to_string().red()),
        }
    }

    Ok(())
}
