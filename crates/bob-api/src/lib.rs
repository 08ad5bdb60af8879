// bob-api: Async client for the BOB camera backend (control plane + detection stream)

pub mod control;
pub mod error;
pub mod transport;
pub mod websocket;

pub use control::{CommandResponse, ControlClient, DetectorConfig, PipelineState, StatusResponse};
pub use error::Error;
pub use transport::{Endpoints, StreamTls, TlsMode, TransportConfig};
pub use websocket::{
    DetectionMessage, DetectionStream, RawDetection, ReconnectConfig, StreamEvent, parse_message,
};
