//! Dashboard screen — camera overlay, health and recent detections.
//!
//! ┌─ BOB ● running  SIM  stream open ─────────────────────────────┐
//! ┌─ Camera ─────────────────────────────┐┌─ Recent (n) ──────────┐
//! │ overlay canvas (frame pixels)        ││ class conf age box    │
//! └─ frame resource ─────────────────────┘└───────────────────────┘
//!  overlay on  boxes on  labels on  conf 50%

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use bob_core::frame::PLACEHOLDER_CAPTION;
use bob_core::status::is_simulated;
use bob_core::{
    Detection, DisplayList, FrameResource, HealthBadge, ModeStatus, Settings, format_age, now_ms,
    recent_detections,
};

use crate::action::{Action, OverlayToggle};
use crate::component::Component;
use crate::theme;
use crate::widgets::detection_table::detection_table;
use crate::widgets::overlay_canvas::OverlayCanvas;
use crate::widgets::status_pill;

/// Width of the recent-detections panel.
const TABLE_WIDTH: u16 = 46;

pub struct DashboardScreen {
    status: ModeStatus,
    frame: FrameResource,
    display: Arc<DisplayList>,
    snapshot: Arc<Vec<Arc<Detection>>>,
    settings: Settings,
    frame_width: f64,
    frame_height: f64,
}

impl DashboardScreen {
    pub fn new(settings: Settings, frame_width: f64, frame_height: f64) -> Self {
        Self {
            status: ModeStatus::default(),
            frame: FrameResource::Placeholder,
            display: Arc::new(DisplayList::new()),
            snapshot: Arc::new(Vec::new()),
            settings,
            frame_width,
            frame_height,
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, now: i64) {
        let badge = HealthBadge::derive(&self.status, now);
        let mut spans = vec![
            Span::styled(" BOB ", theme::title_style()),
            status_pill::pill_span(badge),
        ];
        if is_simulated(&self.status) {
            spans.push(status_pill::sim_badge());
        }
        spans.push(Span::styled(
            format!(
                "  {} · {}",
                self.status.mode,
                status_pill::connection_text(&self.status.connection)
            ),
            theme::table_row(),
        ));
        if let Some(at) = self.status.last_heartbeat_ms {
            spans.push(Span::styled(
                format!(" · heartbeat {}", format_age(now.saturating_sub(at))),
                theme::key_hint(),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_camera(&self, frame: &mut Frame, area: Rect) {
        let mut block = Block::default()
            .title(" Camera ")
            .title_style(theme::title_style())
            .title_bottom(Line::styled(format!(" {} ", self.frame), theme::key_hint()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        if !self.frame.is_live() {
            block = block.title_bottom(
                Line::styled(format!(" {} ", PLACEHOLDER_CAPTION[2]), theme::key_hint())
                    .right_aligned(),
            );
        }

        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            OverlayCanvas::new(&self.display, self.frame_width, self.frame_height),
            inner,
        );
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let flag = |key: &'static str, label: &'static str, on: bool| {
            let state = if on { "on " } else { "off" };
            let color = if on { theme::SUCCESS_GREEN } else { theme::ERROR_RED };
            [
                Span::styled(format!(" {key} "), theme::key_hint_key()),
                Span::styled(format!("{label} "), theme::key_hint()),
                Span::styled(state, Style::default().fg(color)),
            ]
        };

        let mut spans = Vec::new();
        spans.extend(flag("o", "overlay", self.settings.show_overlay));
        spans.extend(flag("b", "boxes", self.settings.show_boxes));
        spans.extend(flag("l", "labels", self.settings.show_labels));
        spans.push(Span::styled(" [/] ", theme::key_hint_key()));
        spans.push(Span::styled(
            format!("conf {:.0}%", self.settings.confidence * 100.0),
            theme::table_row(),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

impl Component for DashboardScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers != KeyModifiers::NONE && key.modifiers != KeyModifiers::SHIFT {
            return Ok(None);
        }
        let action = match key.code {
            KeyCode::Char('o') => Action::Toggle(OverlayToggle::Overlay),
            KeyCode::Char('b') => Action::Toggle(OverlayToggle::Boxes),
            KeyCode::Char('l') => Action::Toggle(OverlayToggle::Labels),
            KeyCode::Char('c') => Action::ClearDetections,
            KeyCode::Char('s') => Action::StartPipeline,
            KeyCode::Char('x') => Action::StopPipeline,
            KeyCode::Char(']') => Action::AdjustConfidence(5),
            KeyCode::Char('[') => Action::AdjustConfidence(-5),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::StatusUpdated { status, frame } => {
                self.status = status.clone();
                self.frame = frame.clone();
            }
            Action::FrameRendered(list) => self.display = Arc::clone(list),
            Action::DetectionsUpdated(snapshot) => self.snapshot = Arc::clone(snapshot),
            Action::SettingsChanged(settings) => self.settings = settings.clone(),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let now = now_ms();
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .areas(area);
        let [camera, table] =
            Layout::horizontal([Constraint::Min(20), Constraint::Length(TABLE_WIDTH)]).areas(body);

        self.render_header(frame, header, now);
        self.render_camera(frame, camera);
        let rows = recent_detections(&self.snapshot, now);
        frame.render_widget(detection_table(&rows, now, true), table);
        self.render_footer(frame, footer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn screen() -> DashboardScreen {
        DashboardScreen::new(Settings::default(), 1920.0, 1080.0)
    }

    #[test]
    fn keys_map_to_operator_actions() {
        let mut s = screen();
        let cases = [
            ('o', Action::Toggle(OverlayToggle::Overlay)),
            ('b', Action::Toggle(OverlayToggle::Boxes)),
            ('l', Action::Toggle(OverlayToggle::Labels)),
            ('c', Action::ClearDetections),
            ('s', Action::StartPipeline),
            ('x', Action::StopPipeline),
            (']', Action::AdjustConfidence(5)),
        ];
        for (c, expected) in cases {
            assert_eq!(s.handle_key_event(key(c)).ok().flatten(), Some(expected));
        }
        assert_eq!(s.handle_key_event(key('z')).ok().flatten(), None);
    }

    #[test]
    fn control_chords_are_ignored() {
        let mut s = screen();
        let chord = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(s.handle_key_event(chord).ok().flatten(), None);
    }

    #[test]
    fn settings_update_replaces_local_copy() {
        let mut s = screen();
        let settings = Settings {
            show_labels: false,
            ..Settings::default()
        };
        s.update(&Action::SettingsChanged(settings.clone())).ok();
        assert_eq!(s.settings, settings);
    }
}
