// ── Liveness prober ──
//
// Periodic reachability check of the backend control plane. Each probe
// runs as its own task bounded by a timeout, so a hung request never
// delays the next tick. Results flow to the mode controller as
// `ControlEvent::Probe`; the prober has no other side effect.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use bob_api::ControlClient;

use crate::controller::ControlEvent;

/// Something that can answer "is the backend up?".
///
/// Implementations never fail: every error is reported as `false`.
pub trait HealthProbe: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

impl HealthProbe for ControlClient {
    fn probe(&self) -> impl Future<Output = bool> + Send {
        self.check_health()
    }
}

/// Run one probe, counting a timeout as unhealthy.
pub async fn probe_once<P: HealthProbe + ?Sized>(probe: &P, timeout: Duration) -> bool {
    if let Ok(healthy) = tokio::time::timeout(timeout, probe.probe()).await {
        healthy
    } else {
        debug!(timeout_ms = timeout.as_millis(), "health probe timed out");
        false
    }
}

/// Schedules periodic probes.
pub struct LivenessProber<P> {
    probe: Arc<P>,
    interval: Duration,
    timeout: Duration,
}

impl<P: HealthProbe> LivenessProber<P> {
    pub fn new(probe: Arc<P>, interval: Duration, timeout: Duration) -> Self {
        Self {
            probe,
            interval,
            timeout,
        }
    }

    /// One-off probe, used for the startup decision.
    pub async fn check(&self) -> bool {
        probe_once(self.probe.as_ref(), self.timeout).await
    }

    /// Spawn the periodic schedule. The first scheduled probe fires one
    /// interval after spawning.
    pub fn spawn(
        &self,
        events: mpsc::Sender<ControlEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(schedule_task(
            Arc::clone(&self.probe),
            self.interval,
            self.timeout,
            events,
            cancel,
        ))
    }
}

async fn schedule_task<P: HealthProbe>(
    probe: Arc<P>,
    period: Duration,
    timeout: Duration,
    events: mpsc::Sender<ControlEvent>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let probe = Arc::clone(&probe);
                let events = events.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let healthy = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        healthy = probe_once(probe.as_ref(), timeout) => healthy,
                    };
                    debug!(healthy, "scheduled probe finished");
                    let _ = events.send(ControlEvent::Probe(healthy)).await;
                });
            }
        }
    }
}
