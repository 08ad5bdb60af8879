//! Health pill, SIM badge and connection summary.

use ratatui::style::{Modifier, Style};
use ratatui::text::Span;

use bob_core::{ConnectionPhase, ConnectionState, HealthBadge};

use crate::theme;

pub fn pill_span(badge: HealthBadge) -> Span<'static> {
    let (symbol, color) = match badge {
        HealthBadge::Running => ("●", theme::SUCCESS_GREEN),
        HealthBadge::Stale => ("◐", theme::ELECTRIC_YELLOW),
        HealthBadge::Stopped => ("◉", theme::CORAL),
        HealthBadge::Unknown => ("?", theme::DIM_WHITE),
        HealthBadge::Offline => ("○", theme::ERROR_RED),
    };
    Span::styled(
        format!(" {symbol} {} ", badge.to_string().to_lowercase()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

pub fn sim_badge() -> Span<'static> {
    Span::styled(
        " SIM ",
        Style::default()
            .fg(theme::BG_DARK)
            .bg(theme::ELECTRIC_YELLOW)
            .add_modifier(Modifier::BOLD),
    )
}

/// One-line description of the stream connection.
pub fn connection_text(state: &ConnectionState) -> String {
    if state.exhausted {
        return format!("gave up after {} retries", state.attempts);
    }
    match (state.phase, state.retry_in) {
        (ConnectionPhase::Open, _) => "stream open".into(),
        (ConnectionPhase::Connecting, _) if state.attempts == 0 => "connecting".into(),
        (ConnectionPhase::Connecting, _) => format!("reconnecting (attempt {})", state.attempts),
        (ConnectionPhase::Disconnected, Some(delay)) => format!(
            "retry {} in {:.1}s",
            state.attempts,
            delay.as_secs_f64()
        ),
        (ConnectionPhase::Disconnected, None) => "disconnected".into(),
    }
}
