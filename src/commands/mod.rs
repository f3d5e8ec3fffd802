//! CLI command handlers.

mod history;
mod init;
mod pipeline;
mod run_once;
mod watch;

pub(crate) use history::{run_history_command, run_remove_history_command, run_status_command};
pub(crate) use init::run_init_command;
pub(crate) use run_once::run_once_command;
pub(crate) use watch::run_watch_command;
