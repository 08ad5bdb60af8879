// ── Core error types ──
//
// Errors surfaced by bob-core setup paths. Runtime failures (probe
// misses, dropped streams, malformed frames) never reach callers; they
// drive mode transitions instead. The `From<bob_api::Error>` impl folds
// transport-layer detail into these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Backend request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Backend rejected the request (HTTP {status})")]
    Rejected { status: u16 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed backend payload: {message}")]
    MalformedPayload { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Controller is shut down")]
    ShutDown,
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bob_api::Error> for CoreError {
    fn from(err: bob_api::Error) -> Self {
        match err {
            bob_api::Error::Transport(ref e) => {
                if let Some(status) = e.status() {
                    CoreError::Rejected {
                        status: status.as_u16(),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                }
            }
            bob_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            bob_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Unsupported URL scheme: {scheme}"),
            },
            bob_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            bob_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            bob_api::Error::Http { status } => CoreError::Rejected { status },
            bob_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            bob_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedPayload { message }
            }
        }
    }
}
