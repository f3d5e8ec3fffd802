//! Configuration file loading and resolution of runtime settings.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use pinfetch_core::{
    DEFAULT_API_ENDPOINT, DEFAULT_BACKUP_SUFFIX, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
    DEFAULT_SOURCE_TAG, DEFAULT_YTDLP_FORMAT,
};

/// Environment variable consulted when the config carries no token.
pub const TOKEN_ENV_VAR: &str = "PINBOARD_TOKEN";

const APP_DIR: &str = "pinfetch";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_HISTORY_FILE: &str = "history.json";
const DEFAULT_YTDLP_PROGRAM: &str = "yt-dlp";

/// Values read from `config.toml`. Absent keys stay `None`.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Pinboard API token (`user:HEX`).
    pub pinboard_token: Option<String>,
    /// Library root that finished videos are promoted into.
    pub download_dir: Option<PathBuf>,
    /// Tag marking bookmarks for download.
    pub source_tag: Option<String>,
    /// Seconds between polls.
    pub poll_interval_secs: Option<u64>,
    /// Strip the tag once a bookmark is ingested.
    pub remove_tag: Option<bool>,
    /// Delete single-tag bookmarks once ingested.
    pub delete_bookmark: Option<bool>,
    /// Re-fetch items already in the history.
    pub force: Option<bool>,
    /// Suffix for backups taken before a forced re-fetch.
    pub backup_suffix: Option<String>,
    /// History ledger path; relative paths resolve against the config directory.
    pub history_file: Option<PathBuf>,
    /// Which fetcher to use.
    pub fetcher: Option<FetcherKind>,
    /// Path to the yt-dlp executable.
    pub ytdlp_path: Option<PathBuf>,
    /// yt-dlp format selector.
    pub ytdlp_format: Option<String>,
    /// Bookmark API base URL.
    pub api_endpoint: Option<String>,
    /// Attempts per bookmark API request.
    pub max_retries: Option<u32>,
    /// Default log level when neither `RUST_LOG` nor `-v`/`-q` is given.
    pub log_level: Option<String>,
    /// Append logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Restore leftover backups at startup.
    pub recover_orphaned_backups: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(interval) = self.poll_interval_secs
            && !(10..=86_400).contains(&interval)
        {
            bail!(
                "Invalid config value for `poll_interval_secs`: {interval}. Expected range: 10..=86400"
            );
        }

        if let Some(max_retries) = self.max_retries
            && !(1..=20).contains(&max_retries)
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 1..=20");
        }

        validate_non_empty("source_tag", self.source_tag.as_deref())?;
        validate_non_empty("backup_suffix", self.backup_suffix.as_deref())?;
        validate_non_empty("pinboard_token", self.pinboard_token.as_deref())?;

        if let Some(tag) = &self.source_tag
            && tag.chars().any(char::is_whitespace)
        {
            bail!("Invalid config value for `source_tag`: '{tag}'. Tags cannot contain spaces");
        }

        if let Some(level) = &self.log_level
            && level.parse::<tracing::Level>().is_err()
        {
            bail!(
                "Invalid config value for `log_level`: '{level}'. Expected one of: trace, debug, info, warn, error"
            );
        }

        Ok(())
    }
}

fn validate_non_empty(field: &str, value: Option<&str>) -> Result<()> {
    if value.is_some_and(|v| v.trim().is_empty()) {
        bail!("Invalid config value for `{field}`: must not be empty");
    }
    Ok(())
}

/// Supported fetcher implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetcherKind {
    /// Drive the `yt-dlp` executable.
    #[default]
    YtDlp,
    /// Stream a direct media URL.
    Http,
}

impl FetcherKind {
    /// Returns the stable string label used in the config file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::Http => "http",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/pinfetch/config.toml`
/// 2. `$HOME/.config/pinfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(APP_DIR)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit`, or from the default path if present.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file '{}' does not exist", path.display());
        }
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "pinboard_token" => {
                cfg.pinboard_token = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "download_dir" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.download_dir = Some(PathBuf::from(parsed));
            }
            "source_tag" => {
                cfg.source_tag = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "poll_interval_secs" => {
                cfg.poll_interval_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "remove_tag" => {
                cfg.remove_tag = Some(parse_boolean(value).with_context(invalid)?);
            }
            "delete_bookmark" => {
                cfg.delete_bookmark = Some(parse_boolean(value).with_context(invalid)?);
            }
            "force" => {
                cfg.force = Some(parse_boolean(value).with_context(invalid)?);
            }
            "backup_suffix" => {
                cfg.backup_suffix = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "history_file" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.history_file = Some(PathBuf::from(parsed));
            }
            "fetcher" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.fetcher = Some(parse_fetcher(&parsed).with_context(|| {
                    format!(
                        "Invalid `fetcher` value '{}' on line {}",
                        parsed,
                        line_index + 1
                    )
                })?);
            }
            "ytdlp_path" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.ytdlp_path = Some(PathBuf::from(parsed));
            }
            "ytdlp_format" => {
                cfg.ytdlp_format = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "api_endpoint" => {
                cfg.api_endpoint = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
                cfg.max_retries = Some(n);
            }
            "log_level" => {
                cfg.log_level = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "log_file" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.log_file = Some(PathBuf::from(parsed));
            }
            "recover_orphaned_backups" => {
                cfg.recover_orphaned_backups = Some(parse_boolean(value).with_context(invalid)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

fn parse_fetcher(value: &str) -> Result<FetcherKind> {
    match value {
        "yt-dlp" => Ok(FetcherKind::YtDlp),
        "http" => Ok(FetcherKind::Http),
        _ => bail!("Expected one of: yt-dlp, http"),
    }
}

/// Effective settings after merging the config file, the environment and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub source_tag: String,
    pub poll_interval: Duration,
    pub remove_tag: bool,
    pub delete_bookmark: bool,
    pub force: bool,
    pub backup_suffix: String,
    pub history_file: PathBuf,
    pub fetcher: FetcherKind,
    pub ytdlp_path: PathBuf,
    pub ytdlp_format: String,
    pub api_endpoint: String,
    pub max_retries: u32,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub recover_orphaned_backups: bool,
}

impl Settings {
    /// Merges `loaded` with `env_token` (used only when the file has no token).
    #[must_use]
    pub fn resolve(loaded: &LoadedConfig, env_token: Option<String>) -> Self {
        let cfg = loaded.config.clone().unwrap_or_default();
        let config_dir = loaded
            .path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let relative_to_config = |p: PathBuf| match &config_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p,
        };

        let history_file = match cfg.history_file {
            Some(path) => relative_to_config(path),
            None => relative_to_config(PathBuf::from(DEFAULT_HISTORY_FILE)),
        };

        Self {
            token: cfg
                .pinboard_token
                .or_else(|| env_token.filter(|t| !t.trim().is_empty())),
            download_dir: cfg.download_dir,
            source_tag: cfg
                .source_tag
                .unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string()),
            poll_interval: cfg
                .poll_interval_secs
                .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs),
            remove_tag: cfg.remove_tag.unwrap_or(true),
            delete_bookmark: cfg.delete_bookmark.unwrap_or(false),
            force: cfg.force.unwrap_or(false),
            backup_suffix: cfg
                .backup_suffix
                .unwrap_or_else(|| DEFAULT_BACKUP_SUFFIX.to_string()),
            history_file,
            fetcher: cfg.fetcher.unwrap_or_default(),
            ytdlp_path: cfg
                .ytdlp_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_PROGRAM)),
            ytdlp_format: cfg
                .ytdlp_format
                .unwrap_or_else(|| DEFAULT_YTDLP_FORMAT.to_string()),
            api_endpoint: cfg
                .api_endpoint
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            max_retries: cfg.max_retries.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            log_level: cfg.log_level,
            log_file: cfg.log_file.map(relative_to_config),
            recover_orphaned_backups: cfg.recover_orphaned_backups.unwrap_or(true),
        }
    }

    /// The library root, or an error naming the missing key.
    pub fn require_download_dir(&self) -> Result<&Path> {
        let Some(dir) = self.download_dir.as_deref() else {
            bail!("`download_dir` is not configured; run `pinfetch init --download-dir <DIR>`");
        };
        if !dir.is_dir() {
            bail!("Download directory '{}' does not exist", dir.display());
        }
        Ok(dir)
    }

    /// The API token, or an error naming where it can be set.
    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().with_context(|| {
            format!("`pinboard_token` is not configured and {TOKEN_ENV_VAR} is not set")
        })
    }
}

/// Renders a commented sample config for `pinfetch init`.
#[must_use]
pub fn render_sample_config(download_dir: Option<&Path>, token: Option<&str>) -> String {
    let mut out = String::from("# pinfetch configuration\n\n");
    match token {
        Some(token) => out.push_str(&format!("pinboard_token = \"{token}\"\n")),
        None => out.push_str(&format!(
            "# pinboard_token = \"user:HEX\"  # or set {TOKEN_ENV_VAR}\n"
        )),
    }
    match download_dir {
        Some(dir) => out.push_str(&format!("download_dir = \"{}\"\n", dir.display())),
        None => out.push_str("# download_dir = \"/path/to/videos\"\n"),
    }
    out.push_str(&format!(
        "\nsource_tag = \"{DEFAULT_SOURCE_TAG}\"\n\
         poll_interval_secs = {}\n\
         remove_tag = true\n\
         delete_bookmark = false\n\
         force = false\n\
         backup_suffix = \"{DEFAULT_BACKUP_SUFFIX}\"\n\
         # history_file = \"{DEFAULT_HISTORY_FILE}\"\n\
         fetcher = \"{}\"\n\
         ytdlp_path = \"{DEFAULT_YTDLP_PROGRAM}\"\n\
         ytdlp_format = \"{DEFAULT_YTDLP_FORMAT}\"\n\
         # api_endpoint = \"{DEFAULT_API_ENDPOINT}\"\n\
         max_retries = {DEFAULT_MAX_ATTEMPTS}\n\
         # log_level = \"info\"\n\
         # log_file = \"pinfetch.log\"\n\
         recover_orphaned_backups = true\n",
        DEFAULT_POLL_INTERVAL.as_secs(),
        FetcherKind::default().as_str(),
    ));
    out
}
