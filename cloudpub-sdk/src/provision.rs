//! Download-once, unpack-once provisioning of the `clo` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapter::PlatformAdapter;
use crate::error::{Error, Result};

/// Makes sure the `clo` executable exists in a working directory.
///
/// The archive and the executable are each an on-disk cache keyed by their
/// fixed file names, so repeated calls only do real work once. Nothing is
/// locked: supervisors sharing a working directory must be serialized by
/// the caller.
pub struct Provisioner {
    adapter: Arc<dyn PlatformAdapter>,
    work_dir: PathBuf,
    download_url: Option<String>,
}

impl Provisioner {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            adapter,
            work_dir: work_dir.into(),
            download_url: None,
        }
    }

    /// Download from `url` instead of the profile's pinned release.
    #[must_use]
    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Local path of the downloaded archive.
    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(self.adapter.profile().archive_name)
    }

    /// Local path of the unpacked executable.
    pub fn executable_path(&self) -> PathBuf {
        self.work_dir.join(self.adapter.profile().executable_name)
    }

    /// Download the archive unless it is already present.
    ///
    /// Returns `true` when a download actually happened.
    pub async fn fetch(&self) -> Result<bool> {
        let archive = self.archive_path();
        if archive.exists() {
            debug!(archive = %archive.display(), "Archive already present, skipping download");
            return Ok(false);
        }

        let url = self
            .download_url
            .as_deref()
            .unwrap_or(self.adapter.profile().download_url);
        self.adapter.download(url, &archive).await?;
        Ok(true)
    }

    /// Extract the executable unless it is already present.
    ///
    /// Returns `true` when the archive was actually unpacked.
    pub async fn unpack(&self) -> Result<bool> {
        let executable = self.executable_path();
        if executable.exists() {
            debug!(executable = %executable.display(), "Executable already present, skipping unpack");
            return Ok(false);
        }

        let archive = self.archive_path();
        self.adapter.unpack(&archive, &self.work_dir).await?;

        if !executable.exists() {
            return Err(Error::Unpack {
                archive,
                reason: format!(
                    "archive did not contain {}",
                    self.adapter.profile().executable_name
                ),
            });
        }
        Ok(true)
    }

    /// Run both steps and return the executable path.
    pub async fn ensure(&self) -> Result<PathBuf> {
        let downloaded = self.fetch().await?;
        let unpacked = self.unpack().await?;
        let executable = self.executable_path();

        info!(
            executable = %executable.display(),
            downloaded,
            unpacked,
            "clo is provisioned"
        );
        Ok(executable)
    }
}
