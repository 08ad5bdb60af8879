// ── Domain model ──
//
// Canonical detection types. Both producers (stream ingest and the
// simulator) build these; the buffer and renderer only ever see them.

pub mod detection;

pub use detection::{BoundingBox, Detection, DetectionId, now_ms};
