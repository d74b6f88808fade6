//! Error types for the CloudPub tunnel supervisor.

use std::path::PathBuf;
use std::time::Duration;

/// Error type for tunnel supervisor operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host OS has no `clo` build.
    #[error("platform '{0}' is not supported")]
    UnsupportedPlatform(String),

    /// An operation needed the `clo` binary before `initialize()` ran.
    #[error("session is not initialized, call initialize() first")]
    NotInitialized,

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("failed to unpack {}: {reason}", archive.display())]
    Unpack { archive: PathBuf, reason: String },

    #[error("failed to start {}: {source}", program.display())]
    ProcessStart {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No ready marker was seen: bad token, tool error, or the deadline passed.
    #[error("tunnel did not start within {timeout:?}: {reason}")]
    TunnelStartFailed { timeout: Duration, reason: String },

    #[error("no active tunnel")]
    NoActiveTunnel,

    #[error("a tunnel is already running (pid {pid:?}), close it first")]
    TunnelAlreadyOpen { pid: Option<u32> },

    #[error("failed to terminate tunnel process: {0}")]
    Termination(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tunnel supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_platform_names_the_os() {
        let error = Error::UnsupportedPlatform("freebsd".to_string());
        assert!(error.to_string().contains("freebsd"));
    }

    #[test]
    fn tunnel_start_failed_displays_timeout_and_reason() {
        let error = Error::TunnelStartFailed {
            timeout: Duration::from_secs(10),
            reason: "clo exited before publishing".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("10s"));
        assert!(message.contains("clo exited before publishing"));
    }

    #[test]
    fn termination_preserves_source() {
        use std::error::Error as _;

        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::Termination(io_error);
        assert!(error.to_string().contains("denied"));
        assert!(error.source().is_some());
    }

    #[test]
    fn process_start_displays_program() {
        let error = Error::ProcessStart {
            program: PathBuf::from("/work/clo"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().contains("/work/clo"));
    }

    #[test]
    fn io_error_converts() {
        let io_error = std::io::Error::other("disk full");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
