// ── Streaming ingest client ──
//
// Keeps the detection stream open with bounded exponential backoff.
// All connection logic lives in `IngestMachine`, a pure transition
// function over typed `StreamEvent`s; `IngestClient` only drives it on
// a tokio task and carries out the resulting effects.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use bob_api::{DetectionStream, ReconnectConfig, StreamEvent, StreamTls, parse_message};

use crate::buffer::DetectionSink;
use crate::controller::ControlEvent;
use crate::convert::normalize_message;
use crate::model::{Detection, now_ms};

// ── ConnectionState ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Open,
}

/// Observable connection state of the detection stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    /// Reconnects attempted since the stream was last open.
    pub attempts: u32,
    /// Pending backoff before the next attempt.
    pub retry_in: Option<Duration>,
    /// Retries ran out; nothing further happens without a new `connect`.
    pub exhausted: bool,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }
}

/// Notices sent from an ingest session to the mode controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSignal {
    StateChanged(ConnectionState),
    /// The stream opened: the backend is online and healthy.
    Online,
    /// A message arrived; carries the heartbeat time.
    Heartbeat(i64),
    /// Reconnection gave up; fall back to simulation.
    RetriesExhausted,
}

// ── IngestMachine ────────────────────────────────────────────────────

/// Work requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Deliver(Vec<Detection>),
    Signal(IngestSignal),
    ScheduleReconnect(Duration),
}

/// Pure connection state machine.
///
/// `Disconnected → Connecting → Open → Disconnected → Connecting …`,
/// ending in a final `Disconnected` once the retry budget is spent.
#[derive(Debug, Clone)]
pub struct IngestMachine {
    state: ConnectionState,
    reconnect: ReconnectConfig,
    wants_reconnect: bool,
}

impl IngestMachine {
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::default(),
            reconnect,
            wants_reconnect: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Begin connecting. No-op while already connecting or open.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state.phase != ConnectionPhase::Disconnected {
            return Vec::new();
        }
        self.wants_reconnect = true;
        self.state.exhausted = false;
        self.state.retry_in = None;
        self.state.phase = ConnectionPhase::Connecting;
        vec![self.state_changed()]
    }

    /// Backoff elapsed: attempt the scheduled reconnect.
    pub fn retry(&mut self) -> Vec<Effect> {
        if !self.wants_reconnect || self.state.phase != ConnectionPhase::Disconnected {
            return Vec::new();
        }
        self.state.retry_in = None;
        self.state.phase = ConnectionPhase::Connecting;
        vec![self.state_changed()]
    }

    /// Explicit shutdown: no further reconnects, counter reset.
    pub fn stop(&mut self) -> Vec<Effect> {
        self.wants_reconnect = false;
        self.state = ConnectionState::default();
        vec![self.state_changed()]
    }

    /// Apply one stream event received at `arrival_ms`.
    pub fn handle(&mut self, event: StreamEvent, arrival_ms: i64) -> Vec<Effect> {
        match event {
            StreamEvent::Opened => {
                self.state = ConnectionState {
                    phase: ConnectionPhase::Open,
                    ..ConnectionState::default()
                };
                vec![self.state_changed(), Effect::Signal(IngestSignal::Online)]
            }
            StreamEvent::MessageReceived(text) => {
                if !self.state.is_open() {
                    return Vec::new();
                }
                match parse_message(&text) {
                    Ok(message) => {
                        let batch = normalize_message(&message, arrival_ms);
                        vec![
                            Effect::Deliver(batch.detections),
                            Effect::Signal(IngestSignal::Heartbeat(batch.heartbeat_ms)),
                        ]
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping malformed detection message");
                        Vec::new()
                    }
                }
            }
            StreamEvent::Closed(_) | StreamEvent::Errored(_) => self.connection_lost(&event),
        }
    }

    fn connection_lost(&mut self, event: &StreamEvent) -> Vec<Effect> {
        if self.state.phase == ConnectionPhase::Disconnected {
            return Vec::new();
        }
        match event {
            StreamEvent::Closed(code) => info!(?code, "detection stream closed"),
            StreamEvent::Errored(reason) => warn!(%reason, "detection stream error"),
            _ => {}
        }

        self.state.phase = ConnectionPhase::Disconnected;

        if !self.wants_reconnect {
            return vec![self.state_changed()];
        }

        if self.reconnect.allows_retry(self.state.attempts) {
            let delay = self.reconnect.delay_for(self.state.attempts);
            self.state.attempts += 1;
            self.state.retry_in = Some(delay);
            info!(
                attempt = self.state.attempts,
                delay_ms = delay.as_millis(),
                "scheduling reconnect"
            );
            vec![self.state_changed(), Effect::ScheduleReconnect(delay)]
        } else {
            warn!(attempts = self.state.attempts, "max reconnect attempts reached");
            self.wants_reconnect = false;
            self.state.retry_in = None;
            self.state.exhausted = true;
            vec![
                self.state_changed(),
                Effect::Signal(IngestSignal::RetriesExhausted),
            ]
        }
    }

    fn state_changed(&self) -> Effect {
        Effect::Signal(IngestSignal::StateChanged(self.state.clone()))
    }
}

// ── Transport seam ───────────────────────────────────────────────────

/// An open stream yielding typed events.
pub trait EventSource: Send + 'static {
    fn next_event(&mut self) -> impl Future<Output = StreamEvent> + Send;
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens detection streams.
pub trait StreamConnector: Send + Sync + 'static {
    type Stream: EventSource;

    fn connect(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<Self::Stream, bob_api::Error>> + Send;
}

/// Production connector over `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    tls: StreamTls,
}

impl WebSocketConnector {
    pub fn new(tls: StreamTls) -> Self {
        Self { tls }
    }
}

impl StreamConnector for WebSocketConnector {
    type Stream = DetectionStream;

    fn connect(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<Self::Stream, bob_api::Error>> + Send {
        DetectionStream::connect(url, &self.tls)
    }
}

impl EventSource for DetectionStream {
    fn next_event(&mut self) -> impl Future<Output = StreamEvent> + Send {
        DetectionStream::next_event(self)
    }

    fn close(self) -> impl Future<Output = ()> + Send {
        DetectionStream::close(self)
    }
}

// ── IngestClient ─────────────────────────────────────────────────────

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives one ingest session at a time.
///
/// Every session gets a fresh generation number, attached to each signal
/// so the controller can discard notices from a torn-down session.
pub struct IngestClient<C> {
    connector: Arc<C>,
    url: Url,
    reconnect: ReconnectConfig,
    sink: DetectionSink,
    signals: mpsc::Sender<ControlEvent>,
    generation: AtomicU64,
    session: Mutex<Option<Session>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl<C: StreamConnector> IngestClient<C> {
    pub fn new(
        connector: C,
        url: Url,
        reconnect: ReconnectConfig,
        sink: DetectionSink,
        signals: mpsc::Sender<ControlEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::default());
        Self {
            connector: Arc::new(connector),
            url,
            reconnect,
            sink,
            signals,
            generation: AtomicU64::new(0),
            session: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Start a session unless one is already connecting, open, or
    /// waiting to retry. Returns the new session's generation.
    pub fn connect(&self) -> Option<u64> {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            debug!("connect ignored: session already active");
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let driver = SessionDriver {
            connector: Arc::clone(&self.connector),
            url: self.url.clone(),
            sink: Arc::clone(&self.sink),
            signals: self.signals.clone(),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
            generation,
        };
        let machine = IngestMachine::new(self.reconnect.clone());
        let handle = tokio::spawn(driver.run(machine));

        *slot = Some(Session { cancel, handle });
        info!(generation, url = %self.url, "ingest session started");
        Some(generation)
    }

    /// Stop reconnecting, cancel the session (pending backoff included)
    /// and wait for it to finish.
    pub async fn disconnect(&self) {
        let session = self.slot().take();
        if let Some(session) = session {
            session.cancel.cancel();
            let _ = session.handle.await;
        }
        self.state.send_replace(ConnectionState::default());
        debug!("ingest disconnected");
    }

    /// Whether a session task is alive.
    pub fn is_active(&self) -> bool {
        self.slot().as_ref().is_some_and(|s| !s.handle.is_finished())
    }

    /// Generation of the most recent session (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Session task ─────────────────────────────────────────────────────

enum Flow {
    Continue,
    Reconnect(Duration),
    Cancelled,
}

struct SessionDriver<C> {
    connector: Arc<C>,
    url: Url,
    sink: DetectionSink,
    signals: mpsc::Sender<ControlEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    generation: u64,
}

impl<C: StreamConnector> SessionDriver<C> {
    async fn run(self, mut machine: IngestMachine) {
        let mut effects = machine.start();

        loop {
            if matches!(self.apply(effects).await, Flow::Cancelled) {
                return;
            }

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                outcome = self.connector.connect(&self.url) => outcome,
            };

            let ended = match outcome {
                Err(e) => machine.handle(StreamEvent::Errored(e.to_string()), now_ms()),
                Ok(stream) => match self.pump(stream, &mut machine).await {
                    Some(ended) => ended,
                    None => return,
                },
            };

            let Flow::Reconnect(delay) = self.apply(ended).await else {
                return;
            };

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            effects = machine.retry();
        }
    }

    /// Read an open stream until it ends. Returns the effects of the
    /// closing event, or `None` if cancelled.
    async fn pump(&self, mut stream: C::Stream, machine: &mut IngestMachine) -> Option<Vec<Effect>> {
        let opened = machine.handle(StreamEvent::Opened, now_ms());
        if matches!(self.apply(opened).await, Flow::Cancelled) {
            stream.close().await;
            return None;
        }

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                event = stream.next_event() => Some(event),
            };
            let Some(event) = event else {
                stream.close().await;
                return None;
            };

            let closing = matches!(event, StreamEvent::Closed(_) | StreamEvent::Errored(_));
            let effects = machine.handle(event, now_ms());
            if closing {
                return Some(effects);
            }
            if matches!(self.apply(effects).await, Flow::Cancelled) {
                stream.close().await;
                return None;
            }
        }
    }

    async fn apply(&self, effects: Vec<Effect>) -> Flow {
        let mut flow = Flow::Continue;
        for effect in effects {
            // Late work from a torn-down session must not land.
            if self.cancel.is_cancelled() {
                return Flow::Cancelled;
            }
            match effect {
                Effect::Deliver(detections) => {
                    debug!(count = detections.len(), "stream batch");
                    (self.sink)(detections);
                }
                Effect::Signal(signal) => {
                    if let IngestSignal::StateChanged(ref state) = signal {
                        self.state.send_replace(state.clone());
                    }
                    self.signal(signal).await;
                }
                Effect::ScheduleReconnect(delay) => flow = Flow::Reconnect(delay),
            }
        }
        flow
    }

    async fn signal(&self, signal: IngestSignal) {
        let event = ControlEvent::Ingest {
            generation: self.generation,
            signal,
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {}
            _ = self.signals.send(event) => {}
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::buffer::DetectionBuffer;

    const ROBIN: &str =
        r#"{"detections":[{"bbox":[10,20,30,40],"confidence":0.92,"class_name":"Robin"}]}"#;

    fn signals(effects: &[Effect]) -> Vec<IngestSignal> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Signal(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn delay_of(effects: &[Effect]) -> Option<Duration> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleReconnect(d) => Some(*d),
            _ => None,
        })
    }

    // ── Machine ──────────────────────────────────────────────────────

    #[test]
    fn opened_goes_online_and_resets_attempts() {
        let mut machine = IngestMachine::new(ReconnectConfig::default());
        machine.start();
        machine.handle(StreamEvent::Errored("refused".into()), 0);
        machine.retry();
        machine.handle(StreamEvent::Errored("refused".into()), 0);
        assert_eq!(machine.state().attempts, 2);

        machine.retry();
        let effects = machine.handle(StreamEvent::Opened, 0);
        assert!(signals(&effects).contains(&IngestSignal::Online));
        assert_eq!(machine.state().phase, ConnectionPhase::Open);
        assert_eq!(machine.state().attempts, 0);
    }

    #[test]
    fn backoff_sequence_then_exhaustion() {
        let mut machine = IngestMachine::new(ReconnectConfig::default());
        machine.start();

        let mut delays = Vec::new();
        for _ in 0..10 {
            let effects = machine.handle(StreamEvent::Errored("refused".into()), 0);
            delays.push(delay_of(&effects).unwrap().as_millis());
            machine.retry();
        }
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000, 30000, 30000]
        );

        let effects = machine.handle(StreamEvent::Closed(Some(1006)), 0);
        assert_eq!(delay_of(&effects), None);
        assert!(signals(&effects).contains(&IngestSignal::RetriesExhausted));
        assert!(machine.state().exhausted);
        assert_eq!(machine.state().phase, ConnectionPhase::Disconnected);

        // Final: a stray retry does nothing.
        assert!(machine.retry().is_empty());
    }

    #[test]
    fn start_is_idempotent_while_connecting_or_open() {
        let mut machine = IngestMachine::new(ReconnectConfig::default());
        assert_eq!(machine.start().len(), 1);
        assert!(machine.start().is_empty());
        machine.handle(StreamEvent::Opened, 0);
        assert!(machine.start().is_empty());
    }

    #[test]
    fn malformed_message_is_dropped_and_stays_open() {
        let mut machine = IngestMachine::new(ReconnectConfig::default());
        machine.start();
        machine.handle(StreamEvent::Opened, 0);

        let effects = machine.handle(StreamEvent::MessageReceived("{oops".into()), 5);
        assert!(effects.is_empty());
        assert!(machine.state().is_open());
    }

    #[test]
    fn message_delivers_batch_and_heartbeat() {
        let mut machine = IngestMachine::new(ReconnectConfig::default());
        machine.start();
        machine.handle(StreamEvent::Opened, 0);

        let effects = machine.handle(StreamEvent::MessageReceived(ROBIN.into()), 777);
        match &effects[..] {
            [Effect::Deliver(dets), Effect::Signal(IngestSignal::Heartbeat(777))] => {
                assert_eq!(dets.len(), 1);
                assert_eq!(dets[0].class_name, "Robin");
                assert_eq!(dets[0].timestamp_ms, 777);
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn stopped_machine_does_not_reconnect() {
        let mut machine = IngestMachine::new(ReconnectConfig::default());
        machine.start();
        machine.handle(StreamEvent::Opened, 0);
        machine.stop();
        assert!(machine.handle(StreamEvent::Closed(None), 0).is_empty());
        assert!(machine.retry().is_empty());
        assert_eq!(machine.state(), &ConnectionState::default());
    }

    // ── Driver ───────────────────────────────────────────────────────

    struct ScriptedStream(mpsc::UnboundedReceiver<StreamEvent>);

    impl EventSource for ScriptedStream {
        async fn next_event(&mut self) -> StreamEvent {
            self.0.recv().await.unwrap_or(StreamEvent::Closed(None))
        }

        async fn close(self) {}
    }

    #[derive(Default)]
    struct ScriptedConnector {
        streams: Mutex<VecDeque<ScriptedStream>>,
        attempts: AtomicUsize,
    }

    impl ScriptedConnector {
        /// Queue a stream that opens successfully; the returned sender
        /// feeds it events.
        fn push_stream(&self) -> mpsc::UnboundedSender<StreamEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.streams.lock().unwrap().push_back(ScriptedStream(rx));
            tx
        }
    }

    impl StreamConnector for Arc<ScriptedConnector> {
        type Stream = ScriptedStream;

        async fn connect(&self, _url: &Url) -> Result<ScriptedStream, bob_api::Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| bob_api::Error::WebSocketConnect("connection refused".into()))
        }
    }

    fn client(
        connector: &Arc<ScriptedConnector>,
        buffer: &Arc<DetectionBuffer>,
    ) -> (IngestClient<Arc<ScriptedConnector>>, mpsc::Receiver<ControlEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let client = IngestClient::new(
            Arc::clone(connector),
            "ws://bob.test/ws/detections".parse().unwrap(),
            ReconnectConfig::default(),
            buffer.sink(),
            tx,
        );
        (client, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_ten_reconnects() {
        let connector = Arc::new(ScriptedConnector::default());
        let buffer = Arc::new(DetectionBuffer::new(10));
        let (client, mut rx) = client(&connector, &buffer);

        let started = tokio::time::Instant::now();
        assert_eq!(client.connect(), Some(1));

        loop {
            match rx.recv().await.unwrap() {
                ControlEvent::Ingest {
                    generation: 1,
                    signal: IngestSignal::RetriesExhausted,
                } => break,
                ControlEvent::Ingest { .. } => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }

        // 1 initial attempt + 10 retries, 1+2+4+8+16+30*5 seconds of backoff.
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 11);
        assert!(started.elapsed() >= Duration::from_secs(181));
        assert!(client.state().exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_noop_while_active() {
        let connector = Arc::new(ScriptedConnector::default());
        let _feed = connector.push_stream();
        let buffer = Arc::new(DetectionBuffer::new(10));
        let (client, _rx) = client(&connector, &buffer);

        assert_eq!(client.connect(), Some(1));
        assert_eq!(client.connect(), None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.connect(), None);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert!(client.state().is_open());

        client.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn messages_reach_buffer() {
        let connector = Arc::new(ScriptedConnector::default());
        let feed = connector.push_stream();
        let buffer = Arc::new(DetectionBuffer::new(10));
        let (client, mut rx) = client(&connector, &buffer);

        client.connect();
        feed.send(StreamEvent::MessageReceived("garbage".into())).unwrap();
        feed.send(StreamEvent::MessageReceived(ROBIN.into())).unwrap();

        loop {
            if let ControlEvent::Ingest {
                signal: IngestSignal::Heartbeat(_),
                ..
            } = rx.recv().await.unwrap()
            {
                break;
            }
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].class_name, "Robin");
        assert!(client.state().is_open());

        client.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_backoff() {
        let connector = Arc::new(ScriptedConnector::default());
        let buffer = Arc::new(DetectionBuffer::new(10));
        let (client, _rx) = client(&connector, &buffer);

        client.connect();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.state().attempts, 1);
        assert_eq!(client.state().retry_in, Some(Duration::from_secs(1)));

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::default());
        assert!(!client.is_active());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

        // An explicit connect re-arms reconnection with a fresh counter.
        assert_eq!(client.connect(), Some(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.state().attempts, 1);
        client.disconnect().await;
    }
}
