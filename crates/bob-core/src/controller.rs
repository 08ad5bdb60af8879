// ── Mode controller ──
//
// Owns the live/simulated decision. Probe results and ingest notices
// arrive on one mpsc channel and are applied by a single task, so mode
// transitions are serialized and only one producer ever writes the
// detection buffer. The outgoing producer is joined before the
// incoming one starts.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use bob_api::{ControlClient, PipelineState};

use crate::buffer::DetectionBuffer;
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::frame::FrameResource;
use crate::ingest::{
    ConnectionState, IngestClient, IngestSignal, StreamConnector, WebSocketConnector,
};
use crate::prober::{HealthProbe, LivenessProber};
use crate::settings::Settings;
use crate::simulator::SimulatedSource;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Observable state ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Live,
    #[default]
    Simulated,
}

/// Backend reachability as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Which producer is writing the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Producer {
    Stream,
    Simulator,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModeStatus {
    pub mode: Mode,
    pub backend: BackendStatus,
    /// The detection stream is open.
    pub online: bool,
    pub last_heartbeat_ms: Option<i64>,
    pub connection: ConnectionState,
    /// Detection pipeline running (backend-reported in live mode, local
    /// flag in simulated mode).
    pub running: bool,
}

/// Inputs to the controller task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Probe(bool),
    Ingest { generation: u64, signal: IngestSignal },
    SetRunning(bool),
}

// ── ModeController ───────────────────────────────────────────────────

/// Entry point for hosts. Cheaply cloneable.
pub struct ModeController<P = ControlClient, C = WebSocketConnector> {
    inner: Arc<Inner<P, C>>,
}

impl<P, C> Clone for ModeController<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<P, C> {
    config: CoreConfig,
    buffer: Arc<DetectionBuffer>,
    control: ControlClient,
    video_url: Url,
    prober: LivenessProber<P>,
    ingest: IngestClient<C>,
    simulator: SimulatedSource,
    status: watch::Sender<ModeStatus>,
    event_tx: mpsc::Sender<ControlEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<ControlEvent>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// State private to the controller task.
#[derive(Debug, Default)]
struct TaskState {
    /// Generation of the ingest session whose notices are honored.
    live_generation: Option<u64>,
}

impl ModeController {
    /// Production wiring: the control client doubles as the health probe.
    pub fn new(config: CoreConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let probe = ControlClient::new(config.backend_url.clone(), &transport)?;
        let connector = WebSocketConnector::new(transport.stream_tls()?);
        Self::with_parts(config, Arc::new(probe), connector)
    }
}

impl<P: HealthProbe, C: StreamConnector> ModeController<P, C> {
    /// Wire a controller from explicit probe and stream connector.
    /// Nothing runs until [`start`](Self::start).
    pub fn with_parts(config: CoreConfig, probe: Arc<P>, connector: C) -> Result<Self, CoreError> {
        let endpoints = config.endpoints()?;
        let control = ControlClient::new(config.backend_url.clone(), &config.transport())?;
        let buffer = Arc::new(DetectionBuffer::new(config.buffer_capacity));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (status, _) = watch::channel(ModeStatus::default());

        let ingest = IngestClient::new(
            connector,
            endpoints.stream()?,
            config.reconnect.clone(),
            buffer.sink(),
            event_tx.clone(),
        );
        let prober = LivenessProber::new(probe, config.probe_interval, config.probe_timeout);
        let simulator = SimulatedSource::new(config.simulator.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                video_url: endpoints.video()?,
                config,
                buffer,
                control,
                prober,
                ingest,
                simulator,
                status,
                event_tx,
                event_rx: Mutex::new(Some(event_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Probe once, pick the initial mode, then spawn the prober and the
    /// controller task.
    pub async fn start(&self) -> Result<(), CoreError> {
        let rx = self
            .inner
            .event_rx
            .lock()
            .await
            .take()
            .ok_or(CoreError::ShutDown)?;

        let healthy = if self.inner.config.start_simulated {
            info!("starting simulated by request");
            false
        } else {
            self.inner.prober.check().await
        };

        let mut state = TaskState::default();
        if healthy {
            self.inner.mark_backend(BackendStatus::Online);
            self.inner.seed_running().await;
            self.inner.enter_live(&mut state).await;
        } else {
            self.inner.mark_backend(BackendStatus::Offline);
            self.inner.enter_simulated(&mut state).await;
        }

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(
            self.inner
                .prober
                .spawn(self.inner.event_tx.clone(), self.inner.cancel.clone()),
        );
        handles.push(tokio::spawn(control_task(
            Arc::clone(&self.inner),
            rx,
            state,
        )));

        info!(mode = %self.mode(), "mode controller started");
        Ok(())
    }

    /// Stop the prober and controller task, then both producers.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.simulator.stop().await;
        self.inner.ingest.disconnect().await;
        debug!("mode controller shut down");
    }

    // ── Control plane ────────────────────────────────────────────────

    /// Start detection. Simulated mode only flips the local flag.
    pub async fn start_pipeline(&self) -> Result<(), CoreError> {
        if self.mode() == Mode::Live {
            self.inner.control.start().await?;
        }
        self.send(ControlEvent::SetRunning(true)).await
    }

    /// Stop detection. Simulated mode only flips the local flag.
    pub async fn stop_pipeline(&self) -> Result<(), CoreError> {
        if self.mode() == Mode::Live {
            self.inner.control.stop().await?;
        }
        self.send(ControlEvent::SetRunning(false)).await
    }

    /// Push detector thresholds to a live backend. Best-effort.
    pub async fn apply_settings(&self, settings: &Settings) {
        if self.mode() == Mode::Live {
            self.inner.control.update_config(&settings.detector()).await;
        } else {
            debug!("settings kept local while simulated");
        }
    }

    /// Drop every buffered detection.
    pub fn clear_detections(&self) {
        self.inner.buffer.clear();
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self) -> ModeStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModeStatus> {
        self.inner.status.subscribe()
    }

    pub fn mode(&self) -> Mode {
        self.inner.status.borrow().mode
    }

    pub fn buffer(&self) -> &Arc<DetectionBuffer> {
        &self.inner.buffer
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Frame resource for the current mode.
    pub fn frame_resource(&self) -> FrameResource {
        match self.mode() {
            Mode::Live => FrameResource::Stream(self.inner.video_url.clone()),
            Mode::Simulated => FrameResource::Placeholder,
        }
    }

    /// Every producer currently running.
    pub fn active_producers(&self) -> Vec<Producer> {
        let mut active = Vec::with_capacity(2);
        if self.inner.ingest.is_active() {
            active.push(Producer::Stream);
        }
        if self.inner.simulator.is_running() {
            active.push(Producer::Simulator);
        }
        active
    }

    /// The single active producer, if exactly one is running.
    pub fn active_producer(&self) -> Option<Producer> {
        match self.active_producers()[..] {
            [one] => Some(one),
            _ => None,
        }
    }

    async fn send(&self, event: ControlEvent) -> Result<(), CoreError> {
        self.inner
            .event_tx
            .send(event)
            .await
            .map_err(|_| CoreError::ShutDown)
    }
}

// ── Transitions ──────────────────────────────────────────────────────

impl<P: HealthProbe, C: StreamConnector> Inner<P, C> {
    async fn on_event(&self, event: ControlEvent, state: &mut TaskState) {
        match event {
            ControlEvent::Probe(healthy) => self.on_probe(healthy, state).await,
            ControlEvent::Ingest { generation, signal } => {
                if state.live_generation != Some(generation) {
                    debug!(generation, ?signal, "ignoring stale ingest signal");
                    return;
                }
                self.on_ingest(signal, state).await;
            }
            ControlEvent::SetRunning(running) => {
                self.status.send_modify(|s| s.running = running);
            }
        }
    }

    async fn on_probe(&self, healthy: bool, state: &mut TaskState) {
        let mode = self.status.borrow().mode;
        if healthy {
            self.mark_backend(BackendStatus::Online);
            if mode == Mode::Simulated {
                info!("backend reachable again, switching to live");
                self.enter_live(state).await;
            }
        } else {
            self.mark_backend(BackendStatus::Offline);
            if mode == Mode::Live {
                warn!("backend unreachable, switching to simulated");
                self.enter_simulated(state).await;
            }
        }
    }

    async fn on_ingest(&self, signal: IngestSignal, state: &mut TaskState) {
        match signal {
            IngestSignal::StateChanged(connection) => {
                self.status.send_modify(|s| {
                    s.online = connection.is_open();
                    s.connection = connection;
                });
            }
            IngestSignal::Online => {
                self.status.send_modify(|s| {
                    s.online = true;
                    s.backend = BackendStatus::Online;
                });
            }
            IngestSignal::Heartbeat(at) => {
                self.status.send_modify(|s| s.last_heartbeat_ms = Some(at));
            }
            IngestSignal::RetriesExhausted => {
                warn!("detection stream gave up, switching to simulated");
                self.mark_backend(BackendStatus::Offline);
                self.enter_simulated(state).await;
            }
        }
    }

    async fn enter_live(&self, state: &mut TaskState) {
        self.simulator.stop().await;
        let generation = self
            .ingest
            .connect()
            .unwrap_or_else(|| self.ingest.generation());
        state.live_generation = Some(generation);
        self.status.send_modify(|s| s.mode = Mode::Live);
        info!(generation, "mode: live");
    }

    async fn enter_simulated(&self, state: &mut TaskState) {
        state.live_generation = None;
        self.ingest.disconnect().await;
        self.simulator.start(self.buffer.sink()).await;
        self.status.send_modify(|s| {
            s.mode = Mode::Simulated;
            s.online = false;
            s.connection = ConnectionState::default();
        });
        info!("mode: simulated");
    }

    /// Adopt the backend's own idea of whether the pipeline runs.
    async fn seed_running(&self) {
        match self.control.status().await {
            Ok(report) => {
                let running = report.status == PipelineState::Running;
                self.status.send_modify(|s| s.running = running);
            }
            Err(e) => debug!(error = %e, "pipeline status unavailable"),
        }
    }

    fn mark_backend(&self, backend: BackendStatus) {
        self.status.send_if_modified(|s| {
            let changed = s.backend != backend;
            s.backend = backend;
            changed
        });
    }
}

async fn control_task<P: HealthProbe, C: StreamConnector>(
    inner: Arc<Inner<P, C>>,
    mut rx: mpsc::Receiver<ControlEvent>,
    mut state: TaskState,
) {
    let cancel = inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                inner.on_event(event, &mut state).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Mode::Live.to_string(), "live");
        assert_eq!(Mode::Simulated.to_string(), "simulated");
        assert_eq!(BackendStatus::Offline.to_string(), "offline");
        assert_eq!(Producer::Stream.to_string(), "stream");
    }

    #[test]
    fn default_status_is_simulated_unknown() {
        let status = ModeStatus::default();
        assert_eq!(status.mode, Mode::Simulated);
        assert_eq!(status.backend, BackendStatus::Unknown);
        assert!(!status.online);
        assert!(status.last_heartbeat_ms.is_none());
    }
}
