// ── Wire-to-domain conversion ──
//
// Turns a parsed `bob_api::DetectionMessage` into domain `Detection`s.
// Identity combines the message time with the item index; missing
// timestamps fall back to the moment the frame arrived.

use bob_api::{DetectionMessage, RawDetection};

use crate::model::{BoundingBox, Detection, DetectionId};

/// A message normalized against its arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    pub detections: Vec<Detection>,
    /// Message time (or arrival time) recorded as the latest heartbeat.
    pub heartbeat_ms: i64,
}

/// How far ahead of the local clock a sender's timestamp may run.
pub const MAX_CLOCK_SKEW_MS: i64 = 60_000;

/// Epoch-millisecond floats from the wire become integral milliseconds.
/// Values outside `[0, arrival + MAX_CLOCK_SKEW_MS]` (non-finite,
/// negative, far future) are treated as absent.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::as_conversions
)]
fn wire_ms(raw: Option<f64>, arrival_ms: i64) -> Option<i64> {
    let latest = arrival_ms.saturating_add(MAX_CLOCK_SKEW_MS) as f64;
    raw.filter(|ts| ts.is_finite() && (0.0..=latest).contains(ts))
        .map(|ts| ts.round() as i64)
}

fn to_detection(raw: &RawDetection, index: usize, message_ms: i64, arrival_ms: i64) -> Detection {
    Detection {
        id: DetectionId::from(format!("{message_ms}-{index}")),
        bbox: BoundingBox::from(raw.bbox),
        confidence: raw.confidence,
        class_name: raw.class_name.clone(),
        timestamp_ms: wire_ms(raw.timestamp, arrival_ms).unwrap_or(message_ms),
    }
}

/// Normalize `message`, received at `arrival_ms`.
pub fn normalize_message(message: &DetectionMessage, arrival_ms: i64) -> NormalizedBatch {
    let message_ms = wire_ms(message.timestamp, arrival_ms).unwrap_or(arrival_ms);
    let detections = message
        .detections
        .iter()
        .enumerate()
        .map(|(index, raw)| to_detection(raw, index, message_ms, arrival_ms))
        .collect();

    NormalizedBatch {
        detections,
        heartbeat_ms: message_ms,
    }
}
