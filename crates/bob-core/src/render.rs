// ── Windowed renderer ──
//
// Each tick draws the detections younger than the visibility window,
// fading linearly with age. Drawing goes through `OverlaySurface`, so a
// host can paint directly or record a `DisplayList` and paint later.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::buffer::DetectionBuffer;
use crate::model::{BoundingBox, Detection, now_ms};
use crate::settings::OverlaySettings;

/// Default visibility window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(2000);

/// Age limit of the recent-detections table.
pub const RECENT_WINDOW_MS: i64 = 10_000;
/// Row limit of the recent-detections table.
pub const RECENT_LIMIT: usize = 100;

const LINE_WIDTH: f64 = 2.0;
const BAR_HEIGHT: f64 = 4.0;
const CHIP_HEIGHT: f64 = 16.0;
const CHIP_PADDING: f64 = 4.0;
const BAR_ALPHA: f64 = 0.3;
const CHIP_ALPHA: f64 = 0.7;

// ── Colors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub const PALETTE: [Rgb; 8] = [
    Rgb::new(255, 99, 132),
    Rgb::new(54, 162, 235),
    Rgb::new(255, 205, 86),
    Rgb::new(75, 192, 192),
    Rgb::new(153, 102, 255),
    Rgb::new(255, 159, 64),
    Rgb::new(199, 199, 199),
    Rgb::new(83, 102, 255),
];

/// Stable palette color for a class label.
///
/// 32-bit wrapping `h = h * 31 + unit` over UTF-16 code units, then
/// `|h| mod 8`. Colors therefore match other dashboards using the same
/// hash.
pub fn class_color(label: &str) -> Rgb {
    let hash = label
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    let index = usize::try_from(hash.unsigned_abs() % 8).unwrap_or(0);
    PALETTE[index]
}

// ── Visibility ───────────────────────────────────────────────────────

/// A detection inside the window together with its fade.
#[derive(Debug, Clone)]
pub struct VisibleDetection {
    pub detection: Arc<Detection>,
    /// Opacity in `[0, 1]`.
    pub alpha: f64,
}

/// Items with `now - ts < window`, in buffer order, with linear fade.
/// Future timestamps render fully opaque.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn visible_detections(
    snapshot: &[Arc<Detection>],
    now_ms: i64,
    window: Duration,
) -> Vec<VisibleDetection> {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    snapshot
        .iter()
        .filter(|d| d.age_ms(now_ms) < window_ms)
        .map(|d| {
            let age = d.age_ms(now_ms) as f64;
            let alpha = (1.0 - age / window_ms as f64).clamp(0.0, 1.0);
            VisibleDetection {
                detection: Arc::clone(d),
                alpha,
            }
        })
        .collect()
}

/// Rows for the recent-detections table: younger than 10s, newest
/// first, at most 100.
pub fn recent_detections(snapshot: &[Arc<Detection>], now_ms: i64) -> Vec<Arc<Detection>> {
    let mut recent: Vec<Arc<Detection>> = snapshot
        .iter()
        .filter(|d| d.age_ms(now_ms) < RECENT_WINDOW_MS)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    recent.truncate(RECENT_LIMIT);
    recent
}

/// Compact age: `now`, `12s`, `3m`, `2h`.
pub fn format_age(age_ms: i64) -> String {
    match age_ms {
        ..1_000 => "now".to_owned(),
        ..60_000 => format!("{}s", age_ms / 1_000),
        ..3_600_000 => format!("{}m", age_ms / 60_000),
        _ => format!("{}h", age_ms / 3_600_000),
    }
}

/// `"{class} {pct}%"` with the percentage rounded to an integer.
pub fn label_text(detection: &Detection) -> String {
    format!("{} {:.0}%", detection.class_name, detection.confidence * 100.0)
}

// ── Surfaces ─────────────────────────────────────────────────────────

/// A 2D drawing target in frame-pixel coordinates.
pub trait OverlaySurface {
    fn clear(&mut self);
    fn stroke_rect(&mut self, rect: BoundingBox, color: Rgb, alpha: f64, line_width: f64);
    fn fill_rect(&mut self, rect: BoundingBox, color: Rgb, alpha: f64);
    /// Draw `text` with its baseline-left at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgb, alpha: f64);
    /// Advance width of `text` in frame pixels.
    fn measure_text(&self, text: &str) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    StrokeRect {
        rect: BoundingBox,
        color: Rgb,
        alpha: f64,
        line_width: f64,
    },
    FillRect {
        rect: BoundingBox,
        color: Rgb,
        alpha: f64,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        color: Rgb,
        alpha: f64,
    },
}

/// Recording surface: stores commands for a host to replay.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
    char_width: f64,
}

impl DisplayList {
    /// Average glyph advance of a 12px sans-serif face.
    pub const DEFAULT_CHAR_WIDTH: f64 = 7.0;

    pub fn new() -> Self {
        Self::with_char_width(Self::DEFAULT_CHAR_WIDTH)
    }

    pub fn with_char_width(char_width: f64) -> Self {
        Self {
            commands: Vec::new(),
            char_width,
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.iter().all(|c| matches!(c, DrawCommand::Clear))
    }
}

impl Default for DisplayList {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlaySurface for DisplayList {
    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke_rect(&mut self, rect: BoundingBox, color: Rgb, alpha: f64, line_width: f64) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color,
            alpha,
            line_width,
        });
    }

    fn fill_rect(&mut self, rect: BoundingBox, color: Rgb, alpha: f64) {
        self.commands.push(DrawCommand::FillRect { rect, color, alpha });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgb, alpha: f64) {
        self.commands.push(DrawCommand::Text {
            text: text.to_owned(),
            x,
            y,
            color,
            alpha,
        });
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn measure_text(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.char_width
    }
}

// ── WindowedRenderer ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowedRenderer {
    window: Duration,
}

impl WindowedRenderer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Draw one frame of `snapshot` as of `now_ms`.
    pub fn render_frame<S: OverlaySurface + ?Sized>(
        &self,
        snapshot: &[Arc<Detection>],
        now_ms: i64,
        settings: OverlaySettings,
        surface: &mut S,
    ) {
        surface.clear();
        if !settings.show_overlay {
            return;
        }

        for visible in visible_detections(snapshot, now_ms, self.window) {
            let det = &visible.detection;
            let alpha = visible.alpha;
            let bbox = det.bbox;

            if settings.show_boxes {
                let color = class_color(&det.class_name);
                surface.stroke_rect(bbox, color, alpha, LINE_WIDTH);
                let bar = BoundingBox::new(
                    bbox.x,
                    bbox.y - BAR_HEIGHT,
                    bbox.width * det.confidence,
                    BAR_HEIGHT,
                );
                surface.fill_rect(bar, color, alpha * BAR_ALPHA);
            }

            if settings.show_labels {
                let label = label_text(det);
                let chip = BoundingBox::new(
                    bbox.x,
                    bbox.y - CHIP_HEIGHT - BAR_HEIGHT,
                    surface.measure_text(&label) + 2.0 * CHIP_PADDING,
                    CHIP_HEIGHT,
                );
                surface.fill_rect(chip, Rgb::BLACK, alpha * CHIP_ALPHA);
                surface.fill_text(
                    &label,
                    bbox.x + CHIP_PADDING,
                    bbox.y - 2.0 * BAR_HEIGHT,
                    Rgb::WHITE,
                    alpha,
                );
            }
        }
    }
}

impl Default for WindowedRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

// ── RenderLoop ───────────────────────────────────────────────────────

/// Repeating render task publishing each frame as a `DisplayList`.
///
/// Cancellation is checked before every tick, and [`stop`](Self::stop)
/// joins the task, so no frame is produced after it returns.
pub struct RenderLoop {
    frames: watch::Receiver<Arc<DisplayList>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RenderLoop {
    pub fn spawn(
        renderer: WindowedRenderer,
        buffer: Arc<DetectionBuffer>,
        settings: watch::Receiver<OverlaySettings>,
        frame_interval: Duration,
    ) -> Self {
        let (tx, frames) = watch::channel(Arc::new(DisplayList::new()));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(render_task(
            renderer,
            buffer,
            settings,
            frame_interval,
            tx,
            cancel.clone(),
        ));
        Self {
            frames,
            cancel,
            handle,
        }
    }

    /// Latest rendered frame.
    pub fn latest(&self) -> Arc<DisplayList> {
        Arc::clone(&self.frames.borrow())
    }

    pub fn frames(&self) -> watch::Receiver<Arc<DisplayList>> {
        self.frames.clone()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
        debug!("render loop stopped");
    }
}

async fn render_task(
    renderer: WindowedRenderer,
    buffer: Arc<DetectionBuffer>,
    settings: watch::Receiver<OverlaySettings>,
    frame_interval: Duration,
    frames: watch::Sender<Arc<DisplayList>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let overlay = *settings.borrow();
                let mut list = DisplayList::new();
                renderer.render_frame(&buffer.snapshot(), now_ms(), overlay, &mut list);
                frames.send_replace(Arc::new(list));
            }
        }
    }
}
