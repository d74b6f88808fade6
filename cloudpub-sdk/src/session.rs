//! Tunnel supervisor: provisions `clo`, publishes a port and owns the process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::adapter::{NativeAdapter, PlatformAdapter};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::output::{OutputScanner, log_line};
use crate::platform::Platform;
use crate::provision::Provisioner;
use crate::state::{SessionState, TunnelRequest};

/// Keeps Windows from opening a console window for `clo`.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// The published tunnel and the process serving it.
struct ActiveTunnel {
    child: Child,
    address: String,
    request: TunnelRequest,
}

/// Supervises one `clo` installation and at most one running tunnel.
///
/// Every operation takes the session explicitly, so independent sessions
/// (each with its own working directory) can coexist in one process.
pub struct TunnelSession {
    config: SessionConfig,
    adapter: Arc<dyn PlatformAdapter>,
    work_dir: PathBuf,
    executable: Option<PathBuf>,
    tunnel: Option<ActiveTunnel>,
}

impl TunnelSession {
    /// Create a session for the host platform.
    ///
    /// Fails with [`Error::UnsupportedPlatform`] when `clo` has no build for
    /// this OS.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let adapter = NativeAdapter::detect()?;
        Ok(Self::with_adapter(config, Arc::new(adapter)))
    }

    /// Create a session that provisions through `adapter`.
    pub fn with_adapter(config: SessionConfig, adapter: Arc<dyn PlatformAdapter>) -> Self {
        let work_dir = config.work_dir.clone();
        Self {
            config,
            adapter,
            work_dir,
            executable: None,
            tunnel: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.executable, &self.tunnel) {
            (None, _) => SessionState::Uninitialized,
            (Some(_), None) => SessionState::Initialized,
            (Some(_), Some(_)) => SessionState::TunnelOpen,
        }
    }

    pub fn platform(&self) -> Platform {
        self.adapter.profile().platform
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Working directory, absolute once the session is initialized.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path of the `clo` executable, once provisioned.
    pub fn executable_path(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Public address of the open tunnel.
    pub fn public_address(&self) -> Option<&str> {
        self.tunnel.as_ref().map(|t| t.address.as_str())
    }

    /// The request the open tunnel was started with.
    pub fn active_request(&self) -> Option<&TunnelRequest> {
        self.tunnel.as_ref().map(|t| &t.request)
    }

    /// OS process id of the tunnel process.
    pub fn pid(&self) -> Option<u32> {
        self.tunnel.as_ref().and_then(|t| t.child.id())
    }

    /// Make sure `clo` is downloaded and unpacked in the working directory.
    ///
    /// Cheap to call again: the archive and executable are only fetched or
    /// extracted when missing.
    pub async fn initialize(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let work_dir = std::path::absolute(&self.config.work_dir)?;

        info!(
            platform = %self.platform(),
            work_dir = %work_dir.display(),
            "Initializing CloudPub session"
        );

        let provisioner = Provisioner::new(Arc::clone(&self.adapter), &work_dir)
            .with_download_url(self.config.download_url.clone());
        let executable = provisioner.ensure().await?;

        self.work_dir = work_dir;
        self.executable = Some(executable);
        Ok(())
    }

    /// Store the CloudPub auth token in `clo`'s own configuration.
    ///
    /// The token is not validated here; a bad token surfaces when a tunnel
    /// fails to open.
    pub async fn set_token(&self, token: &str) -> Result<()> {
        let executable = self.require_executable()?;

        let output = self
            .command(executable)
            .args(["set", "token", token])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::ProcessStart {
                program: executable.to_path_buf(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            log_line(line);
        }

        if output.status.success() {
            info!("Auth token configured");
        } else {
            warn!(status = %output.status, "clo set token exited unsuccessfully");
        }
        Ok(())
    }

    /// Publish a local port and return the public address announced by `clo`.
    ///
    /// Fails with [`Error::TunnelAlreadyOpen`] while a previously opened
    /// tunnel process is still running. On failure the spawned process is
    /// killed and the session stays without a tunnel.
    pub async fn open(&mut self, request: TunnelRequest) -> Result<String> {
        let executable = self.require_executable()?.to_path_buf();

        if let Some(active) = self.tunnel.as_mut() {
            if let Ok(None) | Err(_) = active.child.try_wait() {
                return Err(Error::TunnelAlreadyOpen {
                    pid: active.child.id(),
                });
            }
            debug!("Previous tunnel process already exited, replacing it");
            self.tunnel = None;
        }

        let start = Instant::now();
        let mut child = self
            .command(&executable)
            .args(request.publish_args())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::ProcessStart {
                program: executable.clone(),
                source,
            })?;

        let pid = child.id();
        info!(
            pid,
            protocol = %request.protocol,
            port = request.port,
            "Started clo publish"
        );

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(OutputScanner::new(BufReader::new(stderr)).drain());
        }

        let Some(stdout) = child.stdout.take() else {
            child.kill().await.ok();
            return Err(Error::ProcessStart {
                program: executable,
                source: std::io::Error::other("stdout was not captured"),
            });
        };

        let max_wait = request.max_wait.unwrap_or(self.config.open_timeout);
        let mut scanner = OutputScanner::new(BufReader::new(stdout));
        let ready = match scanner
            .wait_for_address(&self.config.ready_marker, max_wait)
            .await
        {
            Ok(ready) => ready,
            Err(e) => {
                warn!(pid, error = %e, "clo did not publish the service");
                if let Err(kill_error) = child.kill().await {
                    debug!(error = %kill_error, "Failed to kill clo after start failure");
                }
                return Err(e);
            }
        };

        // Keep reading so clo never blocks on a full pipe
        tokio::spawn(scanner.drain());

        info!(
            pid,
            address = %ready.address,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tunnel published"
        );

        let address = ready.address.clone();
        self.tunnel = Some(ActiveTunnel {
            child,
            address: ready.address,
            request,
        });
        Ok(address)
    }

    /// Whether the tunnel process is still running.
    pub fn is_alive(&mut self) -> Result<bool> {
        let active = self.tunnel.as_mut().ok_or(Error::NoActiveTunnel)?;

        match active.child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                debug!(%status, "Tunnel process has exited");
                Ok(false)
            }
            Err(e) => {
                error!(error = %e, "Error checking tunnel process status");
                Ok(false)
            }
        }
    }

    /// Kill the tunnel process.
    ///
    /// A process that already exited, or one that cannot be killed, is
    /// reported as [`Error::Termination`] and the handle is kept.
    pub async fn close(&mut self) -> Result<()> {
        let active = self.tunnel.as_mut().ok_or(Error::NoActiveTunnel)?;

        info!(pid = active.child.id(), address = %active.address, "Stopping tunnel");
        if let Ok(Some(status)) = active.child.try_wait() {
            warn!(%status, "Tunnel process already exited");
            return Err(Error::Termination(std::io::Error::other(format!(
                "process already exited with {}",
                status
            ))));
        }
        active.child.kill().await.map_err(|e| {
            error!(error = %e, "Failed to kill tunnel process");
            Error::Termination(e)
        })?;

        self.tunnel = None;
        info!("Tunnel stopped");
        Ok(())
    }

    fn require_executable(&self) -> Result<&Path> {
        self.executable.as_deref().ok_or(Error::NotInitialized)
    }

    /// A `clo` invocation with output handling shared by every platform.
    fn command(&self, executable: &Path) -> Command {
        let mut cmd = Command::new(executable);
        cmd.current_dir(&self.work_dir).stdin(Stdio::null());
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);
        cmd
    }
}

impl Drop for TunnelSession {
    fn drop(&mut self) {
        if let Some(active) = self.tunnel.as_mut() {
            warn!("TunnelSession dropped with an open tunnel, killing clo");
            if let Err(e) = active.child.start_kill() {
                error!(error = %e, "Failed to kill tunnel process on drop");
            }
        }
    }
}
