//! Platform adapter: the per-OS download and unpack steps behind one trait.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::platform::{Platform, PlatformProfile};

/// Platform-specific steps needed to make `clo` available.
///
/// Resolved once per session so operations never branch on the OS
/// themselves. Tests substitute their own implementation.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Download profile for the platform this adapter serves.
    fn profile(&self) -> &PlatformProfile;

    /// Fetch `url` and store it at `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Extract `archive` into `dest_dir`.
    async fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<()>;
}

/// Adapter backed by `reqwest` for downloads and the system `tar` for unpacking.
pub struct NativeAdapter {
    profile: &'static PlatformProfile,
    client: reqwest::Client,
}

impl NativeAdapter {
    /// Create an adapter for the given platform.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            profile: platform.profile(),
            client: reqwest::Client::new(),
        }
    }

    /// Create an adapter for the host platform.
    pub fn detect() -> Result<Self> {
        Ok(Self::new(Platform::current()?))
    }
}

#[async_trait]
impl PlatformAdapter for NativeAdapter {
    fn profile(&self) -> &PlatformProfile {
        self.profile
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let download_error = |reason: String| Error::Download {
            url: url.to_string(),
            reason,
        };

        info!(url, dest = %dest.display(), "Downloading clo");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;

        // Stream into a sibling file so an interrupted transfer never looks cached
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| download_error(format!("cannot create {}: {}", partial.display(), e)))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_error(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| download_error(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| download_error(e.to_string()))?;
        drop(file);

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| download_error(format!("cannot move into place: {}", e)))?;

        debug!(bytes = written, "Download complete");
        Ok(())
    }

    async fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        let unpack_error = |reason: String| Error::Unpack {
            archive: archive.to_path_buf(),
            reason,
        };

        if !archive.exists() {
            return Err(unpack_error("archive is missing".to_string()));
        }

        info!(archive = %archive.display(), "Unpacking clo");

        // bsdtar ships with Windows 10+ and reads zip archives too
        let output = Command::new("tar")
            .arg(self.profile.format.tar_flags())
            .arg(archive)
            .arg("-C")
            .arg(dest_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| unpack_error(format!("cannot run tar: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unpack_error(format!(
                "tar exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
