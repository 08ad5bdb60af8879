// ── Runtime configuration ──
//
// Describes how the core talks to the backend and paces its timers.
// Never touches disk: bob-config (or a test) builds a `CoreConfig` and
// hands it to `ModeController::new`.

use std::time::Duration;

use bob_api::transport::DEFAULT_STREAM_PATH;
use bob_api::{Endpoints, ReconnectConfig, TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;
use crate::simulator::SimulatorConfig;

/// Nominal backend frame size in pixels.
pub const DEFAULT_FRAME_WIDTH: f64 = 1920.0;
pub const DEFAULT_FRAME_HEIGHT: f64 = 1080.0;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Backend base URL (e.g. `http://localhost:8000`).
    pub backend_url: Url,
    /// TLS strategy for both the control plane and the stream.
    pub tls: TlsMode,
    /// Per-request timeout for control-plane calls.
    pub timeout: Duration,
    /// Path of the detection stream on the backend.
    pub stream_path: String,
    /// Reconnect backoff for the detection stream.
    pub reconnect: ReconnectConfig,
    /// Spacing between periodic liveness probes.
    pub probe_interval: Duration,
    /// Upper bound on a single probe.
    pub probe_timeout: Duration,
    /// Skip the startup probe and stay simulated until a periodic probe
    /// says otherwise.
    pub start_simulated: bool,
    /// Synthetic batch generation in degraded mode.
    pub simulator: SimulatorConfig,
    /// Maximum retained detections.
    pub buffer_capacity: usize,
    /// Visibility window of the overlay.
    pub render_window: Duration,
    pub frame_width: f64,
    pub frame_height: f64,
}

impl CoreConfig {
    /// Defaults for everything but the backend URL.
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            tls: TlsMode::default(),
            timeout: Duration::from_secs(10),
            stream_path: DEFAULT_STREAM_PATH.to_owned(),
            reconnect: ReconnectConfig::default(),
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            start_simulated: false,
            simulator: SimulatorConfig::default(),
            buffer_capacity: crate::buffer::DEFAULT_CAPACITY,
            render_window: crate::render::DEFAULT_WINDOW,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }

    /// Resolve concrete backend endpoints.
    pub fn endpoints(&self) -> Result<Endpoints, CoreError> {
        Ok(Endpoints::with_stream_path(
            self.backend_url.clone(),
            &self.stream_path,
        )?)
    }
}
