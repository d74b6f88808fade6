use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "cloudpub-tunnel", about = "Publish a local port through CloudPub")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the clo download
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and unpack clo without publishing anything
    Init,
    /// Store a CloudPub auth token
    Token(commands::token::TokenArgs),
    /// Publish a local port and keep the tunnel open
    Publish(commands::publish::PublishArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::load(cli.config.as_deref(), cli.work_dir)?;

    match cli.command {
        Commands::Init => commands::init::run(config).await,
        Commands::Token(args) => commands::token::run(args, config).await,
        Commands::Publish(args) => commands::publish::run(args, config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cloudpub-tunnel",
            "init",
            "--verbose",
            "--work-dir",
            "/tmp/clo",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/clo")));
        assert!(matches!(cli.command, Commands::Init));
    }

    #[test]
    fn config_flag_is_optional() {
        let cli = Cli::parse_from(["cloudpub-tunnel", "token", "abc"]);
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::Token(_)));
    }
}
