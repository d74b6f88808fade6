//! Session state and tunnel request types

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`TunnelSession`](crate::TunnelSession).
///
/// `Uninitialized -> Initialized -> TunnelOpen -> Initialized -> ...`;
/// there is no way back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// `clo` has not been provisioned yet.
    Uninitialized,
    /// `clo` is available, no tunnel process is held.
    Initialized,
    /// A tunnel process is held.
    TunnelOpen,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::TunnelOpen => write!(f, "tunnel open"),
        }
    }
}

/// Protocol of the local service being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelProtocol {
    Http,
    Https,
}

impl TunnelProtocol {
    /// Name as passed to `clo publish`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl std::fmt::Display for TunnelProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TunnelProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unknown protocol '{}', expected http or https", other)),
        }
    }
}

/// A request to publish a local port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelRequest {
    pub protocol: TunnelProtocol,
    pub port: u16,
    /// Deadline for `clo` to print the ready line. `None` uses the
    /// session's `open_timeout`.
    pub max_wait: Option<Duration>,
}

impl TunnelRequest {
    pub fn new(protocol: TunnelProtocol, port: u16) -> Self {
        Self {
            protocol,
            port,
            max_wait: None,
        }
    }

    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Arguments for `clo`.
    pub fn publish_args(&self) -> [String; 3] {
        [
            "publish".to_string(),
            self.protocol.as_str().to_string(),
            self.port.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_display() {
        assert_eq!(SessionState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(SessionState::TunnelOpen.to_string(), "tunnel open");
    }

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!("HTTPS".parse::<TunnelProtocol>(), Ok(TunnelProtocol::Https));
        assert_eq!("http".parse::<TunnelProtocol>(), Ok(TunnelProtocol::Http));
        assert!("tcp".parse::<TunnelProtocol>().is_err());
    }

    #[test]
    fn request_defers_deadline_to_session() {
        let request = TunnelRequest::new(TunnelProtocol::Https, 8443);
        assert_eq!(request.max_wait, None);
    }

    #[test]
    fn publish_args_are_lowercase() {
        let request = TunnelRequest::new(TunnelProtocol::Https, 8443);
        assert_eq!(request.publish_args(), ["publish", "https", "8443"]);
    }

    #[test]
    fn with_max_wait_overrides_default() {
        let request =
            TunnelRequest::new(TunnelProtocol::Http, 80).with_max_wait(Duration::from_secs(3));
        assert_eq!(request.max_wait, Some(Duration::from_secs(3)));
    }
}
