//! Paints a rendered `DisplayList` onto a ratatui canvas.
//!
//! Display lists are in camera-frame pixels with a top-left origin;
//! the canvas uses a bottom-left origin, so every y is flipped against
//! the frame height. Colors are alpha-blended over the black background.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::symbols::Marker;
use ratatui::text::Line;
use ratatui::widgets::Widget;
use ratatui::widgets::canvas::{Canvas, Context, Line as CanvasLine, Rectangle};

use bob_core::{BoundingBox, DisplayList, DrawCommand};

use crate::theme::blend_over_black;

/// Horizontal scanlines used to approximate a filled rectangle.
const FILL_LINES: u32 = 4;

pub struct OverlayCanvas<'a> {
    list: &'a DisplayList,
    frame_width: f64,
    frame_height: f64,
}

impl<'a> OverlayCanvas<'a> {
    pub fn new(list: &'a DisplayList, frame_width: f64, frame_height: f64) -> Self {
        Self {
            list,
            frame_width,
            frame_height,
        }
    }

    fn paint(&self, ctx: &mut Context<'_>) {
        for command in self.list.commands() {
            match command {
                DrawCommand::Clear => {}
                DrawCommand::StrokeRect {
                    rect, color, alpha, ..
                } => {
                    let r = flip(*rect, self.frame_height);
                    ctx.draw(&Rectangle {
                        x: r.x,
                        y: r.y,
                        width: r.width,
                        height: r.height,
                        color: blend_over_black(*color, *alpha),
                    });
                }
                DrawCommand::FillRect { rect, color, alpha } => {
                    let color = blend_over_black(*color, *alpha);
                    for y in scanlines(flip(*rect, self.frame_height)) {
                        ctx.draw(&CanvasLine {
                            x1: rect.x,
                            y1: y,
                            x2: rect.x + rect.width,
                            y2: y,
                            color,
                        });
                    }
                }
                DrawCommand::Text {
                    text,
                    x,
                    y,
                    color,
                    alpha,
                } => {
                    let style = Style::default().fg(blend_over_black(*color, *alpha));
                    ctx.print(*x, self.frame_height - y, Line::styled(text.clone(), style));
                }
            }
        }
    }
}

impl Widget for OverlayCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([0.0, self.frame_width])
            .y_bounds([0.0, self.frame_height])
            .paint(|ctx| self.paint(ctx))
            .render(area, buf);
    }
}

/// Frame rect (top-left origin) to canvas rect (bottom-left origin).
pub fn flip(rect: BoundingBox, frame_height: f64) -> BoundingBox {
    BoundingBox::new(
        rect.x,
        frame_height - rect.y - rect.height,
        rect.width,
        rect.height,
    )
}

/// Evenly spaced y values covering `rect`, edges included.
pub fn scanlines(rect: BoundingBox) -> Vec<f64> {
    let step = rect.height / f64::from(FILL_LINES - 1);
    (0..FILL_LINES)
        .map(|i| rect.y + step * f64::from(i))
        .collect()
}
