// ── Operator settings ──
//
// Detector thresholds and overlay toggles. Persisted by bob-config;
// the renderer only ever sees the `OverlaySettings` projection.

use serde::{Deserialize, Serialize};

use bob_api::DetectorConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum detector confidence.
    pub confidence: f64,
    /// Non-maximum suppression threshold.
    pub nms: f64,
    pub show_overlay: bool,
    pub show_boxes: bool,
    pub show_labels: bool,
    /// Video source selector, pushed to the backend with the thresholds.
    pub source: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            nms: 0.4,
            show_overlay: true,
            show_boxes: true,
            show_labels: true,
            source: "camera".into(),
        }
    }
}

impl Settings {
    pub fn overlay(&self) -> OverlaySettings {
        OverlaySettings {
            show_overlay: self.show_overlay,
            show_boxes: self.show_boxes,
            show_labels: self.show_labels,
        }
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            confidence: self.confidence,
            nms: self.nms,
            source: self.source.clone(),
        }
    }
}

/// What the overlay draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySettings {
    pub show_overlay: bool,
    pub show_boxes: bool,
    pub show_labels: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Settings::default().overlay()
    }
}
