//! Dashboard palette and semantic styles.

use ratatui::style::{Color, Modifier, Style};

use bob_core::Rgb;

// ── Core Palette ──────────────────────────────────────────────────────

pub const ELECTRIC_PURPLE: Color = Color::Rgb(225, 53, 255); // #e135ff
pub const NEON_CYAN: Color = Color::Rgb(128, 255, 234); // #80ffea
pub const CORAL: Color = Color::Rgb(255, 106, 193); // #ff6ac1
pub const ELECTRIC_YELLOW: Color = Color::Rgb(241, 250, 140); // #f1fa8c
pub const SUCCESS_GREEN: Color = Color::Rgb(80, 250, 123); // #50fa7b
pub const ERROR_RED: Color = Color::Rgb(255, 99, 99); // #ff6363

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_DARK: Color = Color::Rgb(30, 31, 41); // #1e1f29

// ── Overlay colors ────────────────────────────────────────────────────

/// Composite `rgb` at `alpha` over the black canvas background.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn blend_over_black(rgb: Rgb, alpha: f64) -> Color {
    let a = alpha.clamp(0.0, 1.0);
    let channel = |c: u8| (f64::from(c) * a).round() as u8;
    Color::Rgb(channel(rgb.r), channel(rgb.g), channel(rgb.b))
}

pub fn rgb(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

// ── Semantic Styles ───────────────────────────────────────────────────

pub fn title_style() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

pub fn border_focused() -> Style {
    Style::default().fg(ELECTRIC_PURPLE)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn table_header() -> Style {
    Style::default()
        .fg(NEON_CYAN)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Key hint text (e.g., "q quit  ? help").
pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn key_hint_key() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blend_scales_channels() {
        let rgb = Rgb::new(200, 100, 0);
        assert_eq!(blend_over_black(rgb, 1.0), Color::Rgb(200, 100, 0));
        assert_eq!(blend_over_black(rgb, 0.5), Color::Rgb(100, 50, 0));
        assert_eq!(blend_over_black(rgb, 0.0), Color::Rgb(0, 0, 0));
    }

    #[test]
    fn blend_clamps_alpha() {
        let rgb = Rgb::new(10, 20, 30);
        assert_eq!(blend_over_black(rgb, 1.7), Color::Rgb(10, 20, 30));
        assert_eq!(blend_over_black(rgb, -0.2), Color::Rgb(0, 0, 0));
    }
}
