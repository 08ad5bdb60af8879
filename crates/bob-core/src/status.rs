// ── Status badge derivation ──

use crate::controller::{BackendStatus, Mode, ModeStatus};

/// Heartbeats older than this mark the pipeline stale.
pub const STALE_AFTER_MS: i64 = 5_000;

/// Operator-facing health summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum HealthBadge {
    Offline,
    Unknown,
    Stopped,
    Stale,
    Running,
}

impl HealthBadge {
    /// First match wins: backend offline, backend unknown, pipeline
    /// stopped, heartbeat missing or stale, otherwise running.
    pub fn derive(status: &ModeStatus, now_ms: i64) -> Self {
        match status.backend {
            BackendStatus::Offline => return Self::Offline,
            BackendStatus::Unknown => return Self::Unknown,
            BackendStatus::Online => {}
        }
        if !status.running {
            return Self::Stopped;
        }
        match status.last_heartbeat_ms {
            Some(at) if now_ms.saturating_sub(at) <= STALE_AFTER_MS => Self::Running,
            _ => Self::Stale,
        }
    }
}

/// Whether the `SIM` badge should be shown.
pub fn is_simulated(status: &ModeStatus) -> bool {
    status.mode == Mode::Simulated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online(running: bool, heartbeat: Option<i64>) -> ModeStatus {
        ModeStatus {
            mode: Mode::Live,
            backend: BackendStatus::Online,
            running,
            last_heartbeat_ms: heartbeat,
            ..ModeStatus::default()
        }
    }

    #[test]
    fn precedence() {
        let offline = ModeStatus {
            backend: BackendStatus::Offline,
            running: true,
            ..ModeStatus::default()
        };
        assert_eq!(HealthBadge::derive(&offline, 0), HealthBadge::Offline);
        assert_eq!(
            HealthBadge::derive(&ModeStatus::default(), 0),
            HealthBadge::Unknown
        );
        assert_eq!(
            HealthBadge::derive(&online(false, Some(0)), 0),
            HealthBadge::Stopped
        );
    }

    #[test]
    fn heartbeat_freshness() {
        let now = 100_000;
        assert_eq!(
            HealthBadge::derive(&online(true, Some(now - 5_000)), now),
            HealthBadge::Running
        );
        assert_eq!(
            HealthBadge::derive(&online(true, Some(now - 5_001)), now),
            HealthBadge::Stale
        );
        assert_eq!(
            HealthBadge::derive(&online(true, None), now),
            HealthBadge::Stale
        );
    }

    #[test]
    fn extreme_heartbeat_is_stale() {
        assert_eq!(
            HealthBadge::derive(&online(true, Some(i64::MIN)), 100_000),
            HealthBadge::Stale
        );
    }

    #[test]
    fn sim_badge_follows_mode() {
        assert!(is_simulated(&ModeStatus::default()));
        assert!(!is_simulated(&online(true, None)));
    }
}
