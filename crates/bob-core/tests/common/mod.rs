// Shared fakes for controller integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use url::Url;

use bob_api::{ReconnectConfig, StreamEvent};
use bob_core::{CoreConfig, EventSource, HealthProbe, StreamConnector};

// ── Probe ───────────────────────────────────────────────────────────

/// Health probe whose answer is flipped by the test.
pub struct SwitchProbe {
    healthy: AtomicBool,
}

impl SwitchProbe {
    pub fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(healthy),
        })
    }

    pub fn set(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl HealthProbe for SwitchProbe {
    fn probe(&self) -> impl Future<Output = bool> + Send {
        let healthy = self.healthy.load(Ordering::SeqCst);
        async move { healthy }
    }
}

// ── Stream connector ────────────────────────────────────────────────

pub struct FakeStream(mpsc::UnboundedReceiver<StreamEvent>);

impl EventSource for FakeStream {
    async fn next_event(&mut self) -> StreamEvent {
        self.0.recv().await.unwrap_or(StreamEvent::Closed(None))
    }

    async fn close(self) {}
}

/// Hands out queued streams; refuses once the queue is empty.
#[derive(Default)]
pub struct FakeConnector {
    streams: Mutex<VecDeque<FakeStream>>,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self) -> mpsc::UnboundedSender<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(FakeStream(rx));
        tx
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Newtype so the shared connector can be handed to the controller.
pub struct SharedConnector(pub Arc<FakeConnector>);

impl StreamConnector for SharedConnector {
    type Stream = FakeStream;

    async fn connect(&self, _url: &Url) -> Result<FakeStream, bob_api::Error> {
        self.0.attempts.fetch_add(1, Ordering::SeqCst);
        self.0
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| bob_api::Error::WebSocketConnect("connection refused".into()))
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Fast timings for real-time tests.
pub fn fast_config(backend: &str) -> CoreConfig {
    let mut config = CoreConfig::new(backend.parse().unwrap());
    config.probe_interval = Duration::from_millis(100);
    config.probe_timeout = Duration::from_millis(50);
    config.simulator.batch_sizes = 1..=8;
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_retries: Some(10),
    };
    config
}

/// Poll `check` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
