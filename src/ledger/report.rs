//! Plain-text and JSON projections of the ledger.

use std::fmt::Write as _;

use super::event::HistoryEvent;

const BYTE_UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Formats a byte count in binary units with two decimals (`1.50KiB`).
#[must_use]
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes < 1.0 {
        return format!("{:.2}B", bytes.max(0.0));
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", BYTE_UNITS[unit])
}

/// Pretty-printed JSON array of `events`.
#[must_use]
pub fn render_json(events: &[HistoryEvent]) -> String {
    serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
}

/// Human-readable listing of `events`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn render_human(events: &[HistoryEvent]) -> String {
    if events.is_empty() {
        return "The history is empty.\n".to_string();
    }

    let mut out = String::new();
    for event in events {
        let _ = writeln!(out, "\nTitle: {}", event.description);
        let _ = writeln!(out, "  Date: {}", event.date_time.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "  URL: {}", event.url);
        if event.download_completed {
            let _ = writeln!(out, "  Result: Success");
            match event.stats() {
                Some(stats) => {
                    let _ = writeln!(out, "  Size: {}", format_bytes(stats.size_bytes as f64));
                    let _ = writeln!(out, "  Took: {:.2} seconds", stats.elapsed_seconds);
                    let _ = writeln!(
                        out,
                        "  Download rate: {}/sec",
                        format_bytes(stats.rate_bytes_per_sec())
                    );
                }
                None if !event.error.is_empty() => {
                    let _ = writeln!(out, "  Note: {}", event.error);
                }
                None => {}
            }
            let _ = writeln!(out, "  Video: {}", event.video_file.display());
        } else {
            let _ = writeln!(out, "  Result: Failed");
            let _ = writeln!(out, "  Error: {}", event.error);
        }
    }
    out
}
