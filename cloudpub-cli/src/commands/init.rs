//! Provision clo without publishing

use anyhow::{Context, Result};
use cloudpub_sdk::{SessionConfig, TunnelSession};

/// Run the init command
pub async fn run(config: SessionConfig) -> Result<()> {
    let mut session = TunnelSession::new(config)?;
    session
        .initialize()
        .await
        .context("failed to provision clo")?;

    if let Some(path) = session.executable_path() {
        println!("clo is ready at {}", path.display());
    }
    Ok(())
}
