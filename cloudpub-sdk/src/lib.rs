//! Publish a local port through CloudPub by supervising its `clo` client.
//!
//! The crate downloads and unpacks a pinned `clo` release, stores an auth
//! token through it, runs `clo publish` and reads the public address from
//! the tool's console output. The tunnel itself is entirely `clo`'s job.
//!
//! # Key Types
//!
//! - [`TunnelSession`] - Provisions `clo` and owns the running tunnel process
//! - [`PlatformAdapter`] - Per-OS download and unpack steps
//! - [`Provisioner`] - Download-once, unpack-once cache in a working directory
//! - [`OutputScanner`] - Ready-line detection with a hard deadline
//!
//! # Example
//!
//! ```no_run
//! use cloudpub_sdk::{SessionConfig, TunnelProtocol, TunnelRequest, TunnelSession};
//!
//! async fn example() -> cloudpub_sdk::Result<()> {
//!     let mut session = TunnelSession::new(SessionConfig::default())?;
//!     session.initialize().await?;
//!     session.set_token("YOUR_TOKEN").await?;
//!
//!     let address = session
//!         .open(TunnelRequest::new(TunnelProtocol::Https, 8443))
//!         .await?;
//!     println!("published at {address}");
//!
//!     session.close().await
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod output;
pub mod platform;
pub mod provision;
pub mod session;
pub mod state;

// Re-exports
pub use adapter::{NativeAdapter, PlatformAdapter};
pub use config::{DEFAULT_OPEN_TIMEOUT, SessionConfig};
pub use error::{Error, Result};
pub use output::{OutputScanner, ReadyLine, ReadyMarker};
pub use platform::{ArchiveFormat, CLO_VERSION, Platform, PlatformProfile};
pub use provision::Provisioner;
pub use session::TunnelSession;
pub use state::{SessionState, TunnelProtocol, TunnelRequest};
