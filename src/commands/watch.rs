//! `watch` command: runs the poll loop until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};

use pinfetch_core::{
    BookmarkSource, Clock, PinboardClient, Poller, RetryPolicy, ShutdownHandle, SystemClock,
    TagPolicy,
};

use super::pipeline;
use crate::ProcessExit;
use crate::config::Settings;

pub(crate) async fn run_watch_command(settings: &Settings, force: bool) -> Result<ProcessExit> {
    let token = settings.require_token()?;
    let library = settings.require_download_dir()?;

    let policy = TagPolicy {
        tag: settings.source_tag.clone(),
        delete_bookmark: settings.delete_bookmark,
        remove_tag: settings.remove_tag,
    };
    let source: Arc<dyn BookmarkSource> = Arc::new(
        PinboardClient::new(
            &settings.api_endpoint,
            token,
            policy,
            RetryPolicy::with_max_attempts(settings.max_retries),
        )
        .context("Invalid bookmark API configuration")?,
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let processor =
        pipeline::build_processor(settings, library, force || settings.force, clock.clone())?
            .with_source(source.clone());

    let poller = Poller::new(
        source,
        processor,
        settings.source_tag.as_str(),
        settings.poll_interval,
        clock,
    );

    let (shutdown, shutdown_rx) = ShutdownHandle::new();
    shutdown.install_ctrl_c();
    poller.run(shutdown_rx).await;

    Ok(ProcessExit::Success)
}
