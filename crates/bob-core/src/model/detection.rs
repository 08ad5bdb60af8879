// ── Detection ──
//
// One classified, confidence-scored bounding box at one instant.
// Immutable once built; shared as `Arc<Detection>` from the buffer.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ── DetectionId ─────────────────────────────────────────────────────

/// Opaque per-event identity.
///
/// Stream events use `"{message_ts}-{index}"`, simulated ones
/// `"mock-{ts}-{index}"`. Nothing parses these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionId(String);

impl DetectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DetectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DetectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── BoundingBox ─────────────────────────────────────────────────────

/// Axis-aligned box in frame-pixel units, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

// ── Detection ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: DetectionId,
    pub bbox: BoundingBox,
    /// Score in `[0, 1]`.
    pub confidence: f64,
    pub class_name: String,
    /// Capture time, epoch milliseconds.
    pub timestamp_ms: i64,
}

impl Detection {
    /// Age relative to `now_ms`. Negative for timestamps in the future;
    /// saturates at the `i64` bounds.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}
