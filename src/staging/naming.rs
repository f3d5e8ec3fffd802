//! Naming rules shared by staging and the overwrite guard.

use std::path::Path;

use crate::fetch::sanitize_filename;

/// Suffixes a transfer tool leaves on in-progress files.
pub const TRANSIENT_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

/// Media containers probed when locating the artifact, most preferred first.
pub const CONTAINER_PREFERENCE: [&str; 4] = [".webm", ".avi", ".mkv", ".mp4"];

/// Returns true for in-progress files that must never reach the library.
#[must_use]
pub fn is_transient(file_name: &str) -> bool {
    let lowered = file_name.to_ascii_lowercase();
    TRANSIENT_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix))
}

/// Media base name with transfer-tool suffixes removed.
///
/// `Talk.f137.mp4` -> `Talk`, `Talk.mp4.part` -> `Talk`, `Talk.webm` -> `Talk`.
#[must_use]
pub fn artifact_stem(file_name: &str) -> String {
    let mut name = file_name;

    while let Some(stripped) = strip_transient_suffix(name) {
        name = stripped;
    }

    name = strip_extension(name);

    if let Some(dot) = name.rfind('.') {
        if is_format_code(&name[dot + 1..]) {
            name = &name[..dot];
        }
    }

    name.to_string()
}

/// Library subdirectory name for an artifact.
#[must_use]
pub fn destination_dir_name(artifact: &Path) -> String {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_filename(&artifact_stem(&file_name))
}

fn strip_transient_suffix(name: &str) -> Option<&str> {
    TRANSIENT_SUFFIXES.iter().find_map(|suffix| {
        let at = name.len().checked_sub(suffix.len())?;
        (name.is_char_boundary(at) && name[at..].eq_ignore_ascii_case(suffix)).then(|| &name[..at])
    })
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => &name[..dot],
        _ => name,
    }
}

/// yt-dlp per-format suffix such as `f137` or `f251-1`.
fn is_format_code(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('f') else {
        return false;
    };
    rest.chars().next().is_some_and(|c| c.is_ascii_digit())
        && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
