//! `clo` console output parsing
//!
//! `clo publish` prints a line such as
//! `Сервис опубликован: http://localhost:8443 -> https://abc.cloudpub.ru`
//! once the tunnel is live. Everything else it prints is informational.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// Default prefix of the line announcing a published service.
pub const DEFAULT_READY_PREFIX: &str = "Сервис опубликован";

/// Default token separating the local and public addresses.
pub const DEFAULT_DELIMITER: &str = "-> ";

/// How to recognize the ready line and cut the public address out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyMarker {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_prefix() -> String {
    DEFAULT_READY_PREFIX.to_string()
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

impl Default for ReadyMarker {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            delimiter: default_delimiter(),
        }
    }
}

impl ReadyMarker {
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
        }
    }

    /// Extract the public address if `line` is the ready line.
    pub fn parse(&self, line: &str) -> Option<String> {
        let rest = line.strip_prefix(self.prefix.as_str())?;
        let start = rest.find(self.delimiter.as_str())? + self.delimiter.len();
        let address = rest[start..].trim();
        if address.is_empty() {
            return None;
        }
        Some(address.to_string())
    }
}

/// The ready line found by [`OutputScanner::wait_for_address`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyLine {
    pub address: String,
    /// Lines read up to and including the ready line.
    pub lines_consumed: usize,
}

/// Line reader over a child's output stream.
///
/// Bytes are decoded lossily so a console code page other than UTF-8 never
/// aborts the scan.
pub struct OutputScanner<R> {
    reader: R,
    buf: Vec<u8>,
    last_line: Option<String>,
}

impl<R: AsyncBufRead + Unpin> OutputScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            last_line: None,
        }
    }

    /// Read the next line without its terminator, `None` at end of stream.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Read lines until one matches `marker`, failing once `timeout` elapses.
    ///
    /// The deadline is enforced around the reads themselves, so a child that
    /// stops writing cannot hold the caller past `timeout`.
    pub async fn wait_for_address(
        &mut self,
        marker: &ReadyMarker,
        timeout: Duration,
    ) -> Result<ReadyLine> {
        let start = Instant::now();
        let mut consumed = 0usize;

        let outcome =
            tokio::time::timeout(timeout, self.scan_for(marker, &mut consumed)).await;
        let last = match &self.last_line {
            Some(line) => format!(", last output: {}", line),
            None => String::new(),
        };
        let failed = |reason: String| Error::TunnelStartFailed {
            timeout,
            reason: reason + &last,
        };

        match outcome {
            Ok(Ok(Some(address))) => {
                debug!(
                    lines = consumed,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Ready marker found"
                );
                Ok(ReadyLine {
                    address,
                    lines_consumed: consumed,
                })
            }
            Ok(Ok(None)) => Err(failed(format!(
                "output ended after {} lines without the ready marker",
                consumed
            ))),
            Ok(Err(e)) => Err(failed(format!("cannot read output: {}", e))),
            Err(_) => Err(failed(format!(
                "no ready marker after {} lines",
                consumed
            ))),
        }
    }

    async fn scan_for(
        &mut self,
        marker: &ReadyMarker,
        consumed: &mut usize,
    ) -> std::io::Result<Option<String>> {
        while let Some(line) = self.next_line().await? {
            *consumed += 1;
            if let Some(address) = marker.parse(&line) {
                return Ok(Some(address));
            }
            log_line(&line);
            if !line.trim().is_empty() {
                self.last_line = Some(line);
            }
        }
        Ok(None)
    }

    /// Forward every remaining line to the log until end of stream.
    pub async fn drain(mut self) {
        loop {
            match self.next_line().await {
                Ok(Some(line)) => log_line(&line),
                Ok(None) => break,
                Err(e) => {
                    debug!("Error reading clo output: {}", e);
                    break;
                }
            }
        }
    }
}

/// Log a line of `clo` output at a level guessed from its content.
pub fn log_line(line: &str) {
    match classify(line) {
        LineLevel::Error => error!(target: "clo", "{}", line),
        LineLevel::Warn => warn!(target: "clo", "{}", line),
        LineLevel::Debug => debug!(target: "clo", "{}", line),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineLevel {
    Error,
    Warn,
    Debug,
}

fn classify(line: &str) -> LineLevel {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("ошибка") {
        LineLevel::Error
    } else if lower.contains("warn") || lower.contains("предупреждение") {
        LineLevel::Warn
    } else {
        LineLevel::Debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn test_marker() -> ReadyMarker {
        ReadyMarker::new("Ready", "-> ")
    }

    fn scanner(text: &'static str) -> OutputScanner<&'static [u8]> {
        OutputScanner::new(text.as_bytes())
    }

    #[test]
    fn parse_default_marker_line() {
        let line = "Сервис опубликован: http://localhost:8443 -> https://abc.cloudpub.ru";
        assert_eq!(
            ReadyMarker::default().parse(line),
            Some("https://abc.cloudpub.ru".to_string())
        );
    }

    #[test]
    fn parse_uses_first_delimiter_after_prefix() {
        let line = "Ready -> https://example.com/abc -> extra";
        assert_eq!(
            test_marker().parse(line),
            Some("https://example.com/abc -> extra".to_string())
        );
    }

    #[test]
    fn parse_requires_prefix_at_line_start() {
        assert!(test_marker().parse("Not Ready -> https://example.com").is_none());
        assert!(test_marker().parse(" Ready -> https://example.com").is_none());
    }

    #[test]
    fn parse_requires_delimiter_and_address() {
        assert!(test_marker().parse("Ready https://example.com").is_none());
        assert!(test_marker().parse("Ready -> ").is_none());
    }

    #[test]
    fn parse_trims_trailing_whitespace() {
        assert_eq!(
            test_marker().parse("Ready -> https://example.com/abc  \r"),
            Some("https://example.com/abc".to_string())
        );
    }

    #[test]
    fn classify_levels() {
        assert_eq!(classify("ERROR: invalid token"), LineLevel::Error);
        assert_eq!(classify("Ошибка авторизации"), LineLevel::Error);
        assert_eq!(classify("WARN reconnecting"), LineLevel::Warn);
        assert_eq!(classify("Подключение к серверу"), LineLevel::Debug);
    }

    #[test]
    fn ready_marker_deserializes_with_defaults() {
        let marker: ReadyMarker = toml::from_str(r#"prefix = "Service published""#).unwrap();
        assert_eq!(marker.prefix, "Service published");
        assert_eq!(marker.delimiter, DEFAULT_DELIMITER);
    }

    #[tokio::test]
    async fn next_line_strips_crlf_and_decodes_lossily() {
        let mut scanner = OutputScanner::new(&b"first\r\nsec\xffond\nlast"[..]);

        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(
            scanner.next_line().await.unwrap().as_deref(),
            Some("sec\u{fffd}ond")
        );
        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(scanner.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn wait_returns_address_after_exactly_n_lines() {
        let mut scanner = scanner(
            "Connecting\nAuthorizing\nRegistering\nReady -> https://example.com/abc\nafter\n",
        );

        let ready = scanner
            .wait_for_address(&test_marker(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(ready.address, "https://example.com/abc");
        assert_eq!(ready.lines_consumed, 4);
        assert_eq!(scanner.next_line().await.unwrap().as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn wait_matches_first_line() {
        let mut scanner = scanner("Ready -> https://abc.cloudpub.ru\n");

        let ready = scanner
            .wait_for_address(&test_marker(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(ready.lines_consumed, 1);
    }

    #[tokio::test]
    async fn wait_fails_when_output_ends() {
        let mut scanner = scanner("Ошибка: неверный токен\n");

        let result = scanner
            .wait_for_address(&test_marker(), Duration::from_secs(5))
            .await;

        match result {
            Err(Error::TunnelStartFailed { reason, .. }) => {
                assert!(reason.contains("ended"), "unexpected reason: {reason}");
                assert!(reason.contains("неверный токен"), "unexpected reason: {reason}");
            }
            other => panic!("expected start failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_reason_names_last_nonblank_line() {
        let mut scanner = scanner("Connecting
ERROR: invalid token

");

        let result = scanner
            .wait_for_address(&test_marker(), Duration::from_secs(5))
            .await;

        match result {
            Err(Error::TunnelStartFailed { reason, .. }) => {
                assert!(reason.ends_with("last output: ERROR: invalid token"), "{reason}")
            }
            other => panic!("expected start failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_times_out_on_silent_stream() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"Connecting\n").await.unwrap();
        let mut scanner = OutputScanner::new(BufReader::new(reader));
        let timeout = Duration::from_millis(500);

        let start = Instant::now();
        let result = scanner.wait_for_address(&test_marker(), timeout).await;
        let elapsed = start.elapsed();

        match result {
            Err(Error::TunnelStartFailed { reason, .. }) => {
                assert!(reason.contains("Connecting"), "unexpected reason: {reason}")
            }
            other => panic!("expected start failure, got {other:?}"),
        }
        assert!(elapsed >= timeout, "returned early: {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_secs(1), "overran: {elapsed:?}");
        drop(writer);
    }

    #[tokio::test]
    async fn wait_times_out_on_partial_line() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"Ready -> https://never-terminated").await.unwrap();
        let mut scanner = OutputScanner::new(BufReader::new(reader));

        let result = scanner
            .wait_for_address(&test_marker(), Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(Error::TunnelStartFailed { .. })));
        drop(writer);
    }

    #[tokio::test]
    async fn drain_consumes_until_eof() {
        let scanner = scanner("one\ntwo\nthree\n");
        scanner.drain().await;
    }
}
