//! Auth token command

use anyhow::{Context, Result};
use clap::Args;
use cloudpub_sdk::{SessionConfig, TunnelSession};

/// Arguments for the token command
#[derive(Debug, Args)]
pub struct TokenArgs {
    /// CloudPub auth token
    #[arg(env = "CLOUDPUB_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Run the token command
pub async fn run(args: TokenArgs, config: SessionConfig) -> Result<()> {
    let mut session = TunnelSession::new(config)?;
    session
        .initialize()
        .await
        .context("failed to provision clo")?;
    session.set_token(&args.token).await?;

    println!("Token saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        token: TokenArgs,
    }

    #[test]
    fn test_token_positional() {
        let cli = TestCli::parse_from(["test", "abc123"]);
        assert_eq!(cli.token.token, "abc123");
    }
}
