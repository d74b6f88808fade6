//! Session configuration loading for the CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cloudpub_sdk::SessionConfig;
use directories::ProjectDirs;

/// Per-user config file location (platform-specific)
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("ru", "cloudpub", "cloudpub-tunnel")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the config from `explicit`, else the user config file, else defaults.
///
/// `work_dir` from the command line wins over any file.
pub fn load(explicit: Option<&Path>, work_dir: Option<PathBuf>) -> Result<SessionConfig> {
    let user_path = user_config_path().filter(|path| path.exists());
    let mut config = load_from(explicit.or(user_path.as_deref()))?;

    if let Some(dir) = work_dir {
        config = config.with_work_dir(dir);
    }
    Ok(config)
}

fn load_from(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}
