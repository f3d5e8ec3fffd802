//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Watch a bookmark feed and download tagged videos exactly once.
///
/// Bookmarks carrying the configured tag are fetched into the download
/// directory, recorded in a history file, and untagged once stored.
#[derive(Parser, Debug)]
#[command(name = "pinfetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a sample config file
    Init(InitArgs),
    /// Poll the bookmark feed and download new items until interrupted
    Watch(ForceArgs),
    /// Download a single URL without touching the bookmark feed
    RunOnce(RunOnceArgs),
    /// Show a summary of the download history
    Status,
    /// Print the download history
    History(HistoryArgs),
    /// Remove entries from the download history
    RemoveHistory(RemoveHistoryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Library directory for downloaded videos
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Pinboard API token (user:HEX)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ForceArgs {
    /// Re-download items that are already in the history
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunOnceArgs {
    /// URL of the video to download
    pub url: String,

    #[command(flatten)]
    pub force: ForceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Print a readable report instead of JSON
    #[arg(long)]
    pub human: bool,

    /// Only show failed attempts
    #[arg(long)]
    pub failed_only: bool,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct RemoveHistoryArgs {
    /// Remove the entry for this URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Remove every entry
    #[arg(long)]
    pub all: bool,
}
