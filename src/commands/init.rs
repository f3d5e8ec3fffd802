//! `init` command: writes a sample config file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::ProcessExit;
use crate::cli::InitArgs;
use crate::config;

pub(crate) fn run_init_command(path: Option<&Path>, args: &InitArgs) -> Result<ProcessExit> {
    let Some(path) = path else {
        bail!("Cannot determine a config location; set HOME or pass --config <PATH>");
    };

    if path.exists() && !args.force {
        bail!(
            "Config file '{}' already exists; pass --force to overwrite it",
            path.display()
        );
    }

    if let Some(dir) = &args.download_dir
        && !dir.is_dir()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create download directory '{}'", dir.display()))?;
        info!(path = %dir.display(), "created download directory");
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory '{}'", parent.display()))?;
    }

    let contents = config::render_sample_config(args.download_dir.as_deref(), args.token.as_deref());
    fs::write(path, contents)
        .with_context(|| format!("Failed to write config file '{}'", path.display()))?;

    println!("Wrote config to {}", path.display());
    Ok(ProcessExit::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(download_dir: Option<&Path>, force: bool) -> InitArgs {
        InitArgs {
            download_dir: download_dir.map(Path::to_path_buf),
            token: Some("me:ABC".to_string()),
            force,
        }
    }

    #[test]
    fn test_init_writes_config_and_creates_library() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("cfg").join("config.toml");
        let library = temp.path().join("videos");

        let exit = run_init_command(Some(&config_path), &args(Some(&library), false)).unwrap();

        assert_eq!(exit, ProcessExit::Success);
        assert!(library.is_dir());
        let written = fs::read_to_string(&config_path).unwrap();
        assert!(written.contains("pinboard_token = \"me:ABC\""));
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "force = true\n").unwrap();

        let err = run_init_command(Some(&config_path), &args(None, false)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "force = true\n");

        run_init_command(Some(&config_path), &args(None, true)).unwrap();
        assert!(fs::read_to_string(&config_path).unwrap().contains("source_tag"));
    }
}
