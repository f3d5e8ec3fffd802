//! `run-once` command: ingests a single URL without the bookmark source.

use std::sync::Arc;

use anyhow::Result;

use pinfetch_core::{Clock, Item, ItemOutcome, SystemClock};

use super::pipeline;
use crate::ProcessExit;
use crate::config::Settings;

pub(crate) async fn run_once_command(
    settings: &Settings,
    url: &str,
    force: bool,
) -> Result<ProcessExit> {
    let library = settings.require_download_dir()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let processor = pipeline::build_processor(settings, library, force || settings.force, clock)?;

    let item = Item::synthetic(url);
    let outcome = processor.process(&item).await;
    Ok(report_outcome(url, &outcome))
}

fn report_outcome(url: &str, outcome: &ItemOutcome) -> ProcessExit {
    match outcome {
        ItemOutcome::Succeeded { path } => {
            println!("Downloaded {url} to {}", path.display());
            ProcessExit::Success
        }
        ItemOutcome::Orphaned { path } => {
            println!("Already on disk: {} (added to history)", path.display());
            ProcessExit::Success
        }
        ItemOutcome::Skipped => {
            println!("{url} is already in the history; pass --force to download it again");
            ProcessExit::Success
        }
        ItemOutcome::Failed { error } => {
            eprintln!("Failed to download {url}: {error}");
            ProcessExit::Failure
        }
    }
}
