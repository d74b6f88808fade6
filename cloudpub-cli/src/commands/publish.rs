//! Publish command: open a tunnel and hold it until told to stop

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use cloudpub_sdk::{SessionConfig, TunnelProtocol, TunnelRequest, TunnelSession};
use tracing::{info, warn};
use url::Url;

/// How often the tunnel process is checked while holding.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(2);

/// Arguments for the publish command
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Protocol of the local service (http or https)
    pub protocol: TunnelProtocol,

    /// Local port to publish
    pub port: u16,

    /// Auth token to store before publishing
    #[arg(long, env = "CLOUDPUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// How long to wait for the tunnel to come up, e.g. "10s"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Close the tunnel after this long instead of waiting for Ctrl-C
    #[arg(long, value_parser = humantime::parse_duration)]
    pub hold: Option<Duration>,
}

/// Why holding the tunnel stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldEnd {
    Elapsed,
    Interrupted,
    Exited,
}

/// Run the publish command
pub async fn run(args: PublishArgs, config: SessionConfig) -> Result<()> {
    let mut session = TunnelSession::new(config)?;

    session
        .initialize()
        .await
        .context("failed to provision clo")?;

    if let Some(token) = &args.token {
        session.set_token(token).await?;
    }

    let mut request = TunnelRequest::new(args.protocol, args.port);
    if let Some(timeout) = args.timeout {
        request = request.with_max_wait(timeout);
    }
    let address = session
        .open(request)
        .await
        .with_context(|| format!("failed to publish {} port {}", args.protocol, args.port))?;

    println!("{}", describe_address(&address));

    match hold(&mut session, args.hold).await? {
        HoldEnd::Exited => {
            warn!("clo exited, tunnel is gone");
            return Ok(());
        }
        HoldEnd::Interrupted => info!("Interrupted, closing tunnel"),
        HoldEnd::Elapsed => info!("Hold time elapsed, closing tunnel"),
    }

    session.close().await?;
    Ok(())
}

/// Wait until `duration` passes, Ctrl-C arrives or the tunnel process dies.
async fn hold(session: &mut TunnelSession, duration: Option<Duration>) -> Result<HoldEnd> {
    hold_until(session, duration, tokio::signal::ctrl_c()).await
}

/// Like [`hold`], with `interrupt` standing in for Ctrl-C.
///
/// `interrupt` is polled across every wake-up, so a signal delivered while
/// the liveness check runs is still observed.
async fn hold_until<F>(
    session: &mut TunnelSession,
    duration: Option<Duration>,
    interrupt: F,
) -> Result<HoldEnd>
where
    F: Future<Output = std::io::Result<()>>,
{
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    tokio::pin!(interrupt);

    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => return Ok(HoldEnd::Elapsed),
            result = &mut interrupt => {
                result.context("failed to listen for Ctrl-C")?;
                return Ok(HoldEnd::Interrupted);
            }
            _ = liveness.tick() => {
                if !session.is_alive()? {
                    return Ok(HoldEnd::Exited);
                }
            }
        }
    }
}

/// Human-readable summary of the public address and its port.
fn describe_address(address: &str) -> String {
    match Url::parse(address) {
        Ok(url) => match url.port_or_known_default() {
            Some(port) => format!("Published at {} (port {})", url, port),
            None => format!("Published at {}", url),
        },
        Err(_) => format!("Published at {}", address),
    }
}
