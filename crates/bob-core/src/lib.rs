// bob-core: Detection ingestion, degraded-mode control, and windowed rendering.

pub mod buffer;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod model;
pub mod prober;
pub mod render;
pub mod settings;
pub mod simulator;
pub mod status;

// ── Primary re-exports ──────────────────────────────────────────────
pub use buffer::{DetectionBuffer, DetectionSink};
pub use config::CoreConfig;
pub use controller::{BackendStatus, ControlEvent, Mode, ModeController, ModeStatus, Producer};
pub use error::CoreError;
pub use frame::FrameResource;
pub use ingest::{
    ConnectionPhase, ConnectionState, EventSource, IngestClient, IngestMachine, IngestSignal,
    StreamConnector, WebSocketConnector,
};
pub use model::{BoundingBox, Detection, DetectionId, now_ms};
pub use prober::{HealthProbe, LivenessProber};
pub use render::{
    DisplayList, DrawCommand, OverlaySurface, RenderLoop, Rgb, WindowedRenderer, class_color,
    format_age, recent_detections,
};
pub use settings::{OverlaySettings, Settings};
pub use simulator::{SimulatedSource, SimulatorConfig};
pub use status::HealthBadge;
