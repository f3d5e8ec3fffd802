//! Fetcher that drives an external `yt-dlp` executable.
//!
//! Each finished transfer is reported through a progress template line on the
//! child's output; the final post-processed path comes from
//! `--print after_move:filepath`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{FetchError, FetchOutput, Fetcher, TransferStatus};

/// Format selector used when none is configured.
pub const DEFAULT_YTDLP_FORMAT: &str = "bestvideo*+bestaudio/best";

/// Output template relative to the staging directory.
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Marker prefixing progress lines emitted through `--progress-template`.
const PROGRESS_MARKER: &str = "[pinfetch-progress]";

const PROGRESS_TEMPLATE: &str = "download:[pinfetch-progress] %(progress.status)s|%(progress.downloaded_bytes)s|%(progress.elapsed)s|%(progress.filename)s";

/// Runs `yt-dlp` as a child process per fetch.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    format: String,
}

impl YtDlpFetcher {
    /// Creates a fetcher invoking `program` with the given format selector.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
        }
    }

    fn build_command(&self, url: &str, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-playlist")
            .arg("--no-color")
            .arg("--no-warnings")
            .arg("--newline")
            .arg("--progress")
            .arg("--progress-template")
            .arg(PROGRESS_TEMPLATE)
            .arg("-f")
            .arg(&self.format)
            .arg("-o")
            .arg(output_dir.join(OUTPUT_TEMPLATE))
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--no-simulate")
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // A terminal Ctrl-C must reach only pinfetch, which finishes the
        // current item before stopping.
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp", DEFAULT_YTDLP_FORMAT)
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip(self, output_dir), fields(url = %url))]
    async fn fetch(&self, url: &str, output_dir: &Path) -> Result<FetchOutput, FetchError> {
        let started = Instant::now();
        debug!(program = %self.program.display(), format = %self.format, "spawning yt-dlp");

        let output = self
            .build_command(url, output_dir)
            .output()
            .await
            .map_err(|e| {
                FetchError::extraction(
                    url,
                    format!("failed to run {}: {e}", self.program.display()),
                )
            })?;
        let elapsed = started.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let error = classify_failure(url, &stderr, output.status.code());
            warn!(error = %error, "yt-dlp failed");
            return Err(error);
        }

        let file_path = final_path_from_stdout(&stdout).ok_or_else(|| {
            FetchError::extraction(url, "yt-dlp did not report an output file")
        })?;

        let mut statuses: Vec<TransferStatus> = stdout
            .lines()
            .chain(stderr.lines())
            .filter_map(parse_progress_line)
            .collect();

        if statuses.is_empty() {
            // No progress lines (older yt-dlp or a single pre-merged file).
            let size = tokio::fs::metadata(&file_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            statuses.push(TransferStatus {
                filename: file_path.clone(),
                downloaded_bytes: size,
                elapsed,
            });
        }

        info!(
            path = %file_path.display(),
            transfers = statuses.len(),
            "yt-dlp finished"
        );

        Ok(FetchOutput {
            file_path,
            statuses,
        })
    }
}

/// Last non-empty, non-progress line of stdout.
fn final_path_from_stdout(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(PROGRESS_MARKER))
        .next_back()
        .map(PathBuf::from)
}

/// Parses a `finished` progress line into a transfer status.
fn parse_progress_line(line: &str) -> Option<TransferStatus> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?.trim_start();
    let mut fields = rest.splitn(4, '|');
    let status = fields.next()?;
    if status != "finished" {
        return None;
    }
    let downloaded_bytes = parse_number(fields.next()?).map_or(0, f64_to_u64);
    let elapsed = parse_number(fields.next()?)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(Duration::ZERO, Duration::from_secs_f64);
    let filename = fields.next()?.trim();
    if filename.is_empty() {
        return None;
    }
    Some(TransferStatus {
        filename: PathBuf::from(filename),
        downloaded_bytes,
        elapsed,
    })
}

fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f64_to_u64(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}

/// Maps yt-dlp's stderr to a typed fetch error.
fn classify_failure(url: &str, stderr: &str, code: Option<i32>) -> FetchError {
    let message = stderr
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix("ERROR:"))
        .map(str::trim)
        .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .map_or_else(
            || match code {
                Some(code) => format!("yt-dlp exited with status {code}"),
                None => "yt-dlp terminated by signal".to_string(),
            },
            str::to_string,
        );

    let lowered = message.to_lowercase();
    if lowered.contains("unsupported url") {
        FetchError::unsupported(url, message)
    } else if [
        "http error",
        "unable to download",
        "timed out",
        "connection",
        "name or service not known",
        "getaddrinfo",
        "network is unreachable",
    ]
    .iter()
    .any(|needle| lowered.contains(needle))
    {
        FetchError::network(url, message)
    } else {
        FetchError::extraction(url, message)
    }
}
