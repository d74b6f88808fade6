//! Configuration for a tunnel session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::output::ReadyMarker;

/// Default time to wait for `clo` to announce a published service.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`TunnelSession`](crate::TunnelSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the downloaded archive and the `clo` executable.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Download the archive from here instead of the pinned release URL.
    #[serde(default)]
    pub download_url: Option<String>,

    /// Default readiness deadline for opened tunnels.
    #[serde(default = "default_open_timeout", with = "humantime_serde")]
    pub open_timeout: Duration,

    /// How the ready line printed by `clo` is recognized.
    #[serde(default)]
    pub ready_marker: ReadyMarker,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_open_timeout() -> Duration {
    DEFAULT_OPEN_TIMEOUT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            download_url: None,
            open_timeout: default_open_timeout(),
            ready_marker: ReadyMarker::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    #[must_use]
    pub fn with_work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_ready_marker(mut self, marker: ReadyMarker) -> Self {
        self.ready_marker = marker;
        self
    }
}
