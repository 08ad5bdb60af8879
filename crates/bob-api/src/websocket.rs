//! Detection stream transport.
//!
//! Opens the backend's `/ws/detections` WebSocket and turns raw frames into
//! typed [`StreamEvent`]s. Reconnection policy lives with the caller; this
//! module only provides the [`ReconnectConfig`] backoff schedule and the
//! wire schema of inbound messages.
//!
//! # Example
//!
//! ```rust,ignore
//! use bob_api::transport::StreamTls;
//! use bob_api::websocket::{DetectionStream, StreamEvent};
//!
//! let mut stream = DetectionStream::connect(&url, &StreamTls::default()).await?;
//! loop {
//!     match stream.next_event().await {
//!         StreamEvent::MessageReceived(text) => println!("{text}"),
//!         other => break,
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::StreamTls;

// ── Wire schema ──────────────────────────────────────────────────────

/// One raw detection as sent by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// `[x, y, width, height]` in frame pixels.
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub class_name: String,
    /// Per-item capture time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// A batch of detections for one processed frame.
///
/// Unknown fields are ignored so the backend can grow the schema freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMessage {
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub frame_id: Option<String>,
    /// Message-level time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Parse one text frame into a [`DetectionMessage`].
pub fn parse_message(text: &str) -> Result<DetectionMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(10),
        }
    }
}

impl ReconnectConfig {
    /// Backoff before retry number `attempt + 1`.
    ///
    /// `delay = min(initial * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether another retry is allowed after `attempts` retries so far.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_retries.is_none_or(|max| attempts < max)
    }
}

// ── StreamEvent ──────────────────────────────────────────────────────

/// Typed connection events fed to the ingest state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The WebSocket handshake completed.
    Opened,
    /// A text frame arrived (unparsed).
    MessageReceived(String),
    /// The connection closed, with the close code if the peer sent one.
    Closed(Option<u16>),
    /// Connecting or reading failed.
    Errored(String),
}

// ── DetectionStream ──────────────────────────────────────────────────

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A single open connection to the detection stream.
pub struct DetectionStream {
    socket: Socket,
}

impl DetectionStream {
    /// Perform the WebSocket handshake. `wss://` URLs use `tls`.
    pub async fn connect(url: &Url, tls: &StreamTls) -> Result<Self, Error> {
        tracing::info!(url = %url, custom_tls = tls.is_custom(), "Connecting to detection stream");

        let (socket, _response) = tokio_tungstenite::connect_async_tls_with_config(
            url.as_str(),
            None,
            false,
            tls.connector(),
        )
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("Detection stream connected");
        Ok(Self { socket })
    }

    /// Read until the next event worth reporting.
    ///
    /// Never yields [`StreamEvent::Opened`]; that is implied by a
    /// successful [`connect`](Self::connect).
    pub async fn next_event(&mut self) -> StreamEvent {
        loop {
            match self.socket.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return StreamEvent::MessageReceived(text.as_str().to_owned());
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite answers pings itself
                    tracing::trace!("stream ping");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let code = frame.as_ref().map(|cf| u16::from(cf.code));
                    if let Some(ref cf) = frame {
                        tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                    } else {
                        tracing::info!("close frame received (no payload)");
                    }
                    return StreamEvent::Closed(code);
                }
                Some(Err(e)) => return StreamEvent::Errored(e.to_string()),
                None => {
                    tracing::info!("detection stream ended");
                    return StreamEvent::Closed(None);
                }
                // Binary, Pong, Frame
                Some(Ok(_)) => {}
            }
        }
    }

    /// Close the connection politely. Errors are irrelevant at this point.
    pub async fn close(mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "error while closing detection stream");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_retries, Some(10));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let config = ReconnectConfig::default();
        let secs: Vec<u64> = (0..10).map(|a| config.delay_for(a).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 30, 30, 30, 30, 30]);
    }

    #[test]
    fn backoff_survives_huge_attempt_counts() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for(63), Duration::from_secs(30));
        assert_eq!(config.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn retry_budget() {
        let config = ReconnectConfig::default();
        assert!(config.allows_retry(9));
        assert!(!config.allows_retry(10));

        let forever = ReconnectConfig {
            max_retries: None,
            ..ReconnectConfig::default()
        };
        assert!(forever.allows_retry(10_000));
    }

    #[test]
    fn parse_minimal_message() {
        let msg = parse_message(
            r#"{"detections":[{"bbox":[10,20,30,40],"confidence":0.92,"class_name":"Robin"}]}"#,
        )
        .unwrap();
        assert_eq!(msg.detections.len(), 1);
        assert_eq!(msg.detections[0].bbox, [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(msg.detections[0].class_name, "Robin");
        assert!(msg.timestamp.is_none());
        assert!(msg.frame_id.is_none());
    }

    #[test]
    fn parse_ignores_unknown_fields() {
        let msg = parse_message(
            r#"{"detections":[],"frame_id":"f-7","timestamp":1700000000000,"fps":29.5}"#,
        )
        .unwrap();
        assert!(msg.detections.is_empty());
        assert_eq!(msg.frame_id.as_deref(), Some("f-7"));
        assert_eq!(msg.timestamp, Some(1_700_000_000_000.0));
    }

    #[test]
    fn parse_rejects_short_bbox() {
        let err = parse_message(
            r#"{"detections":[{"bbox":[1,2,3],"confidence":0.5,"class_name":"Crow"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn parse_malformed_json_keeps_body() {
        let err = parse_message("not json at all").unwrap_err();
        match err {
            Error::Deserialization { body, .. } => assert_eq!(body, "not json at all"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
