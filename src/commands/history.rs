//! History commands: `status`, `history` and `remove-history`.

use std::sync::Arc;

use anyhow::{Context, Result};

use pinfetch_core::{Clock, HistoryEvent, LedgerSummary, SystemClock};

use super::pipeline;
use crate::ProcessExit;
use crate::config::Settings;

const RECENT_EVENTS: usize = 5;

fn clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

pub(crate) fn run_status_command(settings: &Settings) -> Result<ProcessExit> {
    let ledger = pipeline::open_ledger(settings, clock())?;
    let summary = ledger
        .summary(RECENT_EVENTS)
        .context("Failed to read history")?;
    print!("{}", render_status(&ledger.path().display().to_string(), &summary));
    Ok(ProcessExit::Success)
}

pub(crate) fn run_history_command(
    settings: &Settings,
    human: bool,
    failed_only: bool,
) -> Result<ProcessExit> {
    let ledger = pipeline::open_ledger(settings, clock())?;
    let rendered = ledger
        .render(human, failed_only)
        .context("Failed to read history")?;
    if rendered.ends_with('\n') {
        print!("{rendered}");
    } else {
        println!("{rendered}");
    }
    Ok(ProcessExit::Success)
}

pub(crate) fn run_remove_history_command(
    settings: &Settings,
    url: Option<&str>,
    all: bool,
) -> Result<ProcessExit> {
    let ledger = pipeline::open_ledger(settings, clock())?;
    if all {
        ledger.remove("", true).context("Failed to clear history")?;
        println!("History cleared.");
        return Ok(ProcessExit::Success);
    }

    let Some(url) = url else {
        return Ok(ProcessExit::Success);
    };
    if ledger
        .remove(url, false)
        .context("Failed to update history")?
    {
        println!("Removed {url} from the history.");
        Ok(ProcessExit::Success)
    } else {
        eprintln!("{url} is not in the history.");
        Ok(ProcessExit::Failure)
    }
}

fn status_line(event: &HistoryEvent) -> String {
    let result = if event.download_completed { "ok" } else { "failed" };
    format!(
        "  {}  {:<6}  {}",
        event.date_time.format("%Y-%m-%d %H:%M"),
        result,
        event.url
    )
}

fn render_status(history_path: &str, summary: &LedgerSummary) -> String {
    let mut out = format!(
        "History: {history_path}\nTotal: {} (completed: {}, failed: {})\n",
        summary.total, summary.completed, summary.failed
    );
    if !summary.recent.is_empty() {
        out.push_str("Recent:\n");
        for event in &summary.recent {
            out.push_str(&status_line(event));
            out.push('\n');
        }
    }
    out
}
