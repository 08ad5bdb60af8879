//! Application core — event loop and action dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bob_config::Config;
use bob_core::{ModeController, OverlaySettings, RenderLoop, Settings, WindowedRenderer};

use crate::action::{Action, Notification, NotificationLevel, OverlayToggle};
use crate::component::Component;
use crate::data_bridge::spawn_data_bridge;
use crate::event::{Event, EventReader};
use crate::screens::dashboard::DashboardScreen;
use crate::theme;
use crate::tui::Tui;

const TICK_RATE: Duration = Duration::from_millis(250);
const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

pub struct App {
    controller: ModeController,
    config: Config,
    config_path: PathBuf,
    dashboard: DashboardScreen,
    /// Overlay toggles as seen by the render loop.
    overlay_tx: watch::Sender<OverlaySettings>,
    notification: Option<(Notification, Instant)>,
    help_visible: bool,
    running: bool,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(controller: ModeController, config: Config, config_path: PathBuf) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (overlay_tx, _) = watch::channel(config.settings.overlay());
        let dashboard = DashboardScreen::new(
            config.settings.clone(),
            controller.config().frame_width,
            controller.config().frame_height,
        );

        Self {
            controller,
            config,
            config_path,
            dashboard,
            overlay_tx,
            notification: None,
            help_visible: false,
            running: true,
            action_tx,
            action_rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;

        let frame_interval = self.config.render.frame_interval();
        let render_loop = RenderLoop::spawn(
            WindowedRenderer::new(self.controller.config().render_window),
            Arc::clone(self.controller.buffer()),
            self.overlay_tx.subscribe(),
            frame_interval,
        );

        let cancel = CancellationToken::new();
        let bridge = tokio::spawn(spawn_data_bridge(
            self.controller.clone(),
            render_loop.frames(),
            self.action_tx.clone(),
            cancel.clone(),
        ));

        let mut events = EventReader::new(TICK_RATE, frame_interval);
        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render | Event::Resize => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if action == Action::Render {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        cancel.cancel();
        let _ = bridge.await;
        render_loop.stop().await;
        self.controller.shutdown().await;
        tui.exit();
        info!("TUI event loop ended");
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.help_visible {
            return Ok(match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Some(Action::ToggleHelp),
                _ => None,
            });
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (KeyModifiers::NONE, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),
            (KeyModifiers::NONE, KeyCode::Char('?')) => return Ok(Some(Action::ToggleHelp)),
            _ => {}
        }

        self.dashboard.handle_key_event(key)
    }

    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,
            Action::ToggleHelp => self.help_visible = !self.help_visible,
            Action::Render => {}

            Action::Tick => {
                if self
                    .notification
                    .as_ref()
                    .is_some_and(|(_, at)| at.elapsed() >= NOTIFICATION_TTL)
                {
                    self.notification = None;
                }
            }

            Action::Notify(notification) => {
                self.notification = Some((notification.clone(), Instant::now()));
            }

            Action::Toggle(which) => {
                let mut settings = self.config.settings.clone();
                apply_toggle(&mut settings, *which);
                self.commit_settings(settings)?;
            }

            Action::AdjustConfidence(delta) => {
                let mut settings = self.config.settings.clone();
                settings.confidence = nudge_confidence(settings.confidence, *delta);
                self.commit_settings(settings)?;
            }

            Action::ClearDetections => {
                self.controller.clear_detections();
                self.action_tx
                    .send(Action::Notify(Notification::info("detections cleared")))?;
            }

            Action::StartPipeline | Action::StopPipeline => {
                let start = *action == Action::StartPipeline;
                let controller = self.controller.clone();
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    let result = if start {
                        controller.start_pipeline().await
                    } else {
                        controller.stop_pipeline().await
                    };
                    let verb = if start { "start" } else { "stop" };
                    let note = match result {
                        Ok(()) => Notification::info(format!("pipeline {verb} requested")),
                        Err(e) => {
                            warn!(error = %e, verb, "pipeline command failed");
                            Notification::error(format!("{verb} failed: {e}"))
                        }
                    };
                    let _ = tx.send(Action::Notify(note));
                });
            }

            other => {
                if let Some(follow_up) = self.dashboard.update(other)? {
                    self.action_tx.send(follow_up)?;
                }
            }
        }
        Ok(())
    }

    /// Persist `settings`, push overlay flags to the render loop, forward
    /// detector thresholds to the backend and refresh the dashboard.
    fn commit_settings(&mut self, settings: Settings) -> Result<()> {
        if settings == self.config.settings {
            return Ok(());
        }
        debug!(?settings, "settings changed");
        self.config.settings = settings.clone();

        if let Err(e) = bob_config::save_config_to(&self.config, &self.config_path) {
            warn!(error = %e, "failed to persist settings");
            self.action_tx.send(Action::Notify(Notification::error(format!(
                "settings not saved: {e}"
            ))))?;
        }

        self.overlay_tx.send_replace(settings.overlay());

        let controller = self.controller.clone();
        let pushed = settings.clone();
        tokio::spawn(async move { controller.apply_settings(&pushed).await });

        self.action_tx.send(Action::SettingsChanged(settings))?;
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let [content, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);

        self.dashboard.render(frame, content);
        self.render_status_bar(frame, status);

        if self.help_visible {
            Self::render_help_overlay(frame, area);
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " c clear  s start  x stop  ? help  q quit",
            theme::key_hint(),
        )];
        if let Some((note, _)) = &self.notification {
            let color = match note.level {
                NotificationLevel::Info => theme::NEON_CYAN,
                NotificationLevel::Error => theme::ERROR_RED,
            };
            spans.push(Span::styled(
                format!(" │ {}", note.message),
                Style::default().fg(color),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_help_overlay(frame: &mut Frame, area: Rect) {
        let width = 44u16.min(area.width.saturating_sub(4));
        let height = 14u16.min(area.height.saturating_sub(4));
        let help_area = Rect::new(
            area.x + (area.width.saturating_sub(width)) / 2,
            area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        );

        frame.render_widget(Clear, help_area);
        let block = Block::default()
            .title(" Keyboard Shortcuts ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused())
            .style(Style::default().bg(theme::BG_DARK));

        let row = |key: &'static str, text: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {key:<8}"), theme::key_hint_key()),
                Span::styled(text, theme::key_hint()),
            ])
        };
        let lines = vec![
            Line::from(""),
            row("o", "Toggle overlay"),
            row("b", "Toggle boxes"),
            row("l", "Toggle labels"),
            row("[ / ]", "Confidence -/+ 5%"),
            row("c", "Clear detections"),
            row("s / x", "Start / stop pipeline"),
            row("?", "This help"),
            row("q", "Quit"),
            Line::from(""),
            Line::from(Span::styled("        Esc or ? to close", theme::key_hint())),
        ];

        frame.render_widget(Paragraph::new(lines).block(block), help_area);
    }
}

fn apply_toggle(settings: &mut Settings, which: OverlayToggle) {
    let flag = match which {
        OverlayToggle::Overlay => &mut settings.show_overlay,
        OverlayToggle::Boxes => &mut settings.show_boxes,
        OverlayToggle::Labels => &mut settings.show_labels,
    };
    *flag = !*flag;
}

/// Step the threshold by `delta` hundredths, clamped to `[0.05, 0.95]`.
fn nudge_confidence(current: f64, delta: i8) -> f64 {
    let next = current + f64::from(delta) / 100.0;
    ((next * 100.0).round() / 100.0).clamp(0.05, 0.95)
}
