//! Colored terminal rendering for calsync-core types.

use calsync_core::config::EndpointConfig;
use calsync_core::matcher::StaleDestination;
use calsync_core::plan::{ActionKind, PlannedAction, SyncPlan};
use calsync_core::sync::{AppliedEvent, FailedAction, SyncResult};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for ActionKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            ActionKind::Create => symbol.green().to_string(),
            ActionKind::Update => symbol.yellow().to_string(),
            ActionKind::Skip => symbol.dimmed().to_string(),
        }
    }
}

fn colorize(kind: ActionKind, text: &str) -> String {
    match kind {
        ActionKind::Create => text.green().to_string(),
        ActionKind::Update => text.yellow().to_string(),
        ActionKind::Skip => text.dimmed().to_string(),
    }
}

impl Render for PlannedAction {
    fn render(&self) -> String {
        let kind = self.kind();
        format!(
            "{} {} {}",
            kind.render(),
            colorize(kind, &self.event.to_string()),
            self.event.render_time().dimmed()
        )
    }
}

fn render_applied(kind: ActionKind, applied: &AppliedEvent) -> String {
    format!(
        "{} {} {}",
        kind.render(),
        colorize(kind, &applied.event.to_string()),
        applied.event.render_time().dimmed()
    )
}

impl Render for FailedAction {
    fn render(&self) -> String {
        format!(
            "{} {} {}\n      {}",
            "!".red(),
            self.event.to_string().red(),
            self.event.render_time().dimmed(),
            self.error.to_string().red()
        )
    }
}

impl Render for StaleDestination {
    fn render(&self) -> String {
        format!(
            "{} {} {} {}",
            "?".dimmed(),
            self.event.to_string().dimmed(),
            self.event.render_time().dimmed(),
            "(source gone, left in place)".dimmed()
        )
    }
}

impl Render for EndpointConfig {
    fn render(&self) -> String {
        format!("📅 {self}")
    }
}

/// Show counts instead of individual events above this many
const COMPACT_THRESHOLD: usize = 5;

fn pluralize(count: usize) -> &'static str {
    if count == 1 { "event" } else { "events" }
}

fn compact_line(kind: ActionKind, count: usize, label: &str) -> String {
    let text = format!("({} {} {})", count, label, pluralize(count));
    format!("   {} {}", kind.render(), colorize(kind, &text))
}

fn render_applied_list(
    kind: ActionKind,
    applied: &[AppliedEvent],
    label: &str,
    verbose: bool,
    lines: &mut Vec<String>,
) {
    if applied.is_empty() {
        return;
    }
    if verbose || applied.len() <= COMPACT_THRESHOLD {
        lines.extend(
            applied
                .iter()
                .map(|a| format!("   {}", render_applied(kind, a))),
        );
    } else {
        lines.push(compact_line(kind, applied.len(), label));
    }
}

fn render_advisories(
    failed: &[FailedAction],
    stale: &[StaleDestination],
    rejected: usize,
    lines: &mut Vec<String>,
) {
    lines.extend(failed.iter().map(|f| format!("   {}", f.render())));
    lines.extend(stale.iter().map(|s| format!("   {}", s.render())));
    if rejected > 0 {
        lines.push(format!(
            "   {}",
            format!("{} malformed {} ignored", rejected, pluralize(rejected)).dimmed()
        ));
    }
}

/// Rendering with a compact mode for long lists
pub trait RenderVerbose {
    fn render(&self, verbose: bool) -> String;
}

impl RenderVerbose for SyncResult {
    fn render(&self, verbose: bool) -> String {
        let mut lines = Vec::new();

        render_applied_list(ActionKind::Create, &self.created, "new", verbose, &mut lines);
        render_applied_list(ActionKind::Update, &self.updated, "changed", verbose, &mut lines);
        render_advisories(
            &self.failed,
            &self.stale_advisories,
            self.rejected.len(),
            &mut lines,
        );

        if lines.is_empty() {
            lines.push("   No changes".dimmed().to_string());
        }

        if let Some(abort) = &self.aborted {
            lines.push(format!("   {}", abort.to_string().red()));
        }

        lines.join("\n")
    }
}

impl RenderVerbose for SyncPlan {
    fn render(&self, verbose: bool) -> String {
        let mut lines = Vec::new();
        let changes: Vec<&PlannedAction> = self
            .actions
            .iter()
            .filter(|a| a.kind() != ActionKind::Skip)
            .collect();

        if verbose || changes.len() <= COMPACT_THRESHOLD {
            lines.extend(changes.iter().map(|a| format!("   {}", a.render())));
        } else {
            let (creates, updates, _) = self.counts();
            if creates > 0 {
                lines.push(compact_line(ActionKind::Create, creates, "new"));
            }
            if updates > 0 {
                lines.push(compact_line(ActionKind::Update, updates, "changed"));
            }
        }

        render_advisories(&[], &self.stale_advisories, 0, &mut lines);

        if lines.is_empty() {
            lines.push("   No changes".dimmed().to_string());
        }

        lines.join("\n")
    }
}
