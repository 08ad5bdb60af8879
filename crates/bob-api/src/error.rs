use thiserror::Error;

/// Top-level error type for the `bob-api` crate.
///
/// Covers the control-plane HTTP surface and the detection stream.
/// `bob-core` maps these into its own diagnostics; nothing here is
/// ever shown to an operator directly.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The backend URL uses a scheme we cannot upgrade to a stream endpoint.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Request exceeded the client's configured timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Control plane ───────────────────────────────────────────────
    /// Non-success status from the control plane.
    #[error("Backend returned HTTP {status}")]
    Http { status: u16 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}
