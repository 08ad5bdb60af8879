// ── Simulated event source ──
//
// Synthesizes plausible detection batches while the backend is away,
// so the overlay keeps moving in degraded mode. The generator is a pure
// function over any `rand::Rng`; the timer task owns its own `StdRng`.

use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::buffer::DetectionSink;
use crate::model::{BoundingBox, Detection, DetectionId, now_ms};

pub const BIRD_CLASSES: [&str; 10] = [
    "Robin", "Sparrow", "Crow", "Blue Jay", "Cardinal", "Finch", "Pigeon", "Hawk", "Eagle", "Owl",
];

pub const OTHER_CLASSES: [&str; 4] = ["Plane", "Cloud", "Unknown", "Edge"];

const BIRD_PROBABILITY: f64 = 0.7;

// ── Generation ───────────────────────────────────────────────────────

/// Build `count` synthetic detections stamped from `now_ms`.
///
/// Positions stay inside a 1600×800 region of the nominal 1920×1080
/// frame so most boxes remain in bounds. Item `i` is stamped `now_ms + i`
/// to keep the batch strictly ordered.
pub fn generate_batch<R: Rng + ?Sized>(rng: &mut R, count: usize, now_ms: i64) -> Vec<Detection> {
    (0..count)
        .map(|i| {
            let x = rng.gen_range(0.0..1600.0_f64).round();
            let y = rng.gen_range(0.0..800.0_f64).round();
            let width = rng.gen_range(50.0..200.0_f64).round();
            let height = rng.gen_range(50.0..200.0_f64).round();

            let is_bird = rng.gen_bool(BIRD_PROBABILITY);
            let (classes, confidence): (&[&str], f64) = if is_bird {
                (&BIRD_CLASSES, rng.gen_range(0.7..1.0))
            } else {
                (&OTHER_CLASSES, rng.gen_range(0.4..0.7))
            };
            let class_name = classes.choose(rng).copied().unwrap_or("Unknown");

            let offset = i64::try_from(i).unwrap_or(i64::MAX);
            Detection {
                id: DetectionId::from(format!("mock-{now_ms}-{i}")),
                bbox: BoundingBox::new(x, y, width, height),
                confidence,
                class_name: class_name.to_owned(),
                timestamp_ms: now_ms.saturating_add(offset),
            }
        })
        .collect()
}

// ── SimulatorConfig ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Batch cadence. Default: 500ms.
    pub interval: Duration,
    /// Batch sizes drawn uniformly per tick. Default: `0..=8`.
    pub batch_sizes: RangeInclusive<usize>,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            batch_sizes: 0..=8,
            seed: None,
        }
    }
}

// ── SimulatedSource ──────────────────────────────────────────────────

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic generator of synthetic batches.
///
/// At most one generation task exists. [`stop`](Self::stop) cancels and
/// joins it, so no batch is delivered after `stop` returns.
pub struct SimulatedSource {
    config: SimulatorConfig,
    running: Mutex<Option<Running>>,
}

impl SimulatedSource {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    /// Begin delivering batches to `sink`. Restarts if already running.
    pub async fn start(&self, sink: DetectionSink) {
        self.stop().await;

        let cancel = CancellationToken::new();
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let handle = tokio::spawn(generation_task(
            self.config.clone(),
            rng,
            sink,
            cancel.clone(),
        ));

        *self.slot() = Some(Running { cancel, handle });
        info!(interval_ms = self.config.interval.as_millis(), "simulator started");
    }

    /// Halt generation and drop the sink. No-op when not started.
    pub async fn stop(&self) {
        let Some(running) = self.slot().take() else {
            return;
        };
        running.cancel.cancel();
        let _ = running.handle.await;
        info!("simulator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

async fn generation_task(
    config: SimulatorConfig,
    mut rng: StdRng,
    sink: DetectionSink,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let count = rng.gen_range(config.batch_sizes.clone());
                let batch = generate_batch(&mut rng, count, now_ms());
                debug!(count, "simulated batch");
                sink(batch);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn collecting_sink() -> (DetectionSink, Arc<Mutex<Vec<Vec<Detection>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: DetectionSink = Arc::new(move |batch| sink_seen.lock().unwrap().push(batch));
        (sink, seen)
    }

    #[test]
    fn batch_respects_value_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let batch = generate_batch(&mut rng, 500, 1_000);
        assert_eq!(batch.len(), 500);

        for det in &batch {
            assert!((0.0..=1600.0).contains(&det.bbox.x));
            assert!((0.0..=800.0).contains(&det.bbox.y));
            assert!((50.0..=200.0).contains(&det.bbox.width));
            assert!((50.0..=200.0).contains(&det.bbox.height));
            assert!(det.bbox.x.fract().abs() < f64::EPSILON);

            if BIRD_CLASSES.contains(&det.class_name.as_str()) {
                assert!((0.7..1.0).contains(&det.confidence));
            } else {
                assert!(OTHER_CLASSES.contains(&det.class_name.as_str()));
                assert!((0.4..0.7).contains(&det.confidence));
            }
        }

        let birds = batch
            .iter()
            .filter(|d| BIRD_CLASSES.contains(&d.class_name.as_str()))
            .count();
        assert!((300..400).contains(&birds), "bird share off: {birds}/500");
    }

    #[test]
    fn batch_ids_and_timestamps_are_ordered() {
        let mut rng = StdRng::seed_from_u64(1);
        let batch = generate_batch(&mut rng, 3, 5_000);
        let ids: Vec<&str> = batch.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["mock-5000-0", "mock-5000-1", "mock-5000-2"]);
        let ts: Vec<i64> = batch.iter().map(|d| d.timestamp_ms).collect();
        assert_eq!(ts, vec![5_000, 5_001, 5_002]);
    }

    #[test]
    fn same_seed_same_batch() {
        let a = generate_batch(&mut StdRng::seed_from_u64(99), 4, 0);
        let b = generate_batch(&mut StdRng::seed_from_u64(99), 4, 0);
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_on_interval_until_stopped() {
        let source = SimulatedSource::default();
        let (sink, seen) = collecting_sink();

        source.start(sink).await;
        assert!(source.is_running());

        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);

        source.stop().await;
        assert!(!source.is_running());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
        for batch in seen.lock().unwrap().iter() {
            assert!(batch.len() <= 8);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_switches_sink() {
        let source = SimulatedSource::default();
        let (first, first_seen) = collecting_sink();
        let (second, second_seen) = collecting_sink();

        source.start(first).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        source.start(second).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        source.stop().await;

        assert_eq!(first_seen.lock().unwrap().len(), 1);
        assert_eq!(second_seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_when_idle_is_noop() {
        let source = SimulatedSource::default();
        source.stop().await;
        assert!(!source.is_running());
    }
}
