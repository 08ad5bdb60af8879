//! UI actions. Every state change in the app flows through one of these.

use std::sync::Arc;

use bob_core::{Detection, DisplayList, FrameResource, ModeStatus, Settings};

/// Which overlay layer a toggle key flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayToggle {
    Overlay,
    Boxes,
    Labels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NotificationLevel::Info,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NotificationLevel::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Tick,
    Render,
    ToggleHelp,

    // ── Operator commands ──
    Toggle(OverlayToggle),
    /// Nudge the detector confidence threshold by this many hundredths.
    AdjustConfidence(i8),
    ClearDetections,
    StartPipeline,
    StopPipeline,

    // ── Data updates from the bridge ──
    StatusUpdated {
        status: ModeStatus,
        frame: FrameResource,
    },
    FrameRendered(Arc<DisplayList>),
    DetectionsUpdated(Arc<Vec<Arc<Detection>>>),
    /// Operator settings after a toggle was applied.
    SettingsChanged(Settings),

    Notify(Notification),
}
