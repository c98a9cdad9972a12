use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use core_types::{LiveMetrics, LossSample, Mode, ReplayError, ResourceSample, SeriesKind};
use infra_clock::{Clock, ClockReading, ReplayClock, ReplayPolicy};
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};

use crate::events::{ReplayBus, ReplayEvent};
use crate::store::{MetricsSeriesStore, ModeSeries};
use crate::views::{
    estimate_remaining_ms, format_hms, progress_percent, round1, MemoryUsage, ModeChange,
    ModeInfo, ReplayHealth, RunState, Sample, StreamFrame, Temperatures, TrainingStatus,
    TrainingSummary, Window,
};

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub sampling_interval: Duration,
    pub policy: ReplayPolicy,
    pub total_epochs: u32,
    pub initial_mode: Mode,
    pub default_window: usize,
    pub load_timeout: Duration,
    pub stream_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(3),
            policy: ReplayPolicy::Clamp,
            total_epochs: 3,
            initial_mode: Mode::Manual,
            default_window: 20,
            load_timeout: Duration::from_secs(5),
            stream_interval: Duration::from_secs(3),
        }
    }
}

/// Mode, start time and series of the active replay. Swapped as one unit
/// so no reader ever pairs one mode's series with another mode's start.
#[derive(Debug)]
struct ReplayState {
    mode: Mode,
    started_at: DateTime<Utc>,
    series: Arc<ModeSeries>,
    generation: u64,
    completion_announced: AtomicBool,
}

/// A consistent read of the replay at one instant.
struct Reading {
    state: Arc<ReplayState>,
    clock: ClockReading,
    now: DateTime<Utc>,
}

impl Reading {
    fn loss(&self) -> Result<&LossSample, ReplayError> {
        let rows = self.state.series.loss();
        if rows.is_empty() {
            return Err(unavailable(SeriesKind::Loss));
        }
        Ok(&rows[self.clock.index])
    }

    fn resource(&self) -> Result<&ResourceSample, ReplayError> {
        let rows = self.state.series.resource();
        if rows.is_empty() {
            return Err(unavailable(SeriesKind::Resource));
        }
        Ok(&rows[self.clock.index])
    }
}

fn unavailable(kind: SeriesKind) -> ReplayError {
    metrics::counter!("replay.unavailable", "kind" => kind.as_str()).increment(1);
    ReplayError::unavailable(kind)
}

/// Last `min(last_n, index + 1)` rows ending at `index`, oldest first.
fn window_of<T: Clone>(rows: &[T], index: usize, last_n: usize) -> Vec<T> {
    let end = index + 1;
    let start = end.saturating_sub(last_n);
    rows[start..end].to_vec()
}

pub struct ReplayEngine {
    cfg: ReplayConfig,
    clock: ReplayClock,
    time: Arc<dyn Clock>,
    store: Arc<MetricsSeriesStore>,
    state: RwLock<Arc<ReplayState>>,
    switch: Mutex<()>,
    bus: ReplayBus,
    booted_at: DateTime<Utc>,
}

impl ReplayEngine {
    /// Builds an engine over whatever the store already holds for the
    /// initial mode. Use [`ReplayEngine::start`] to load first.
    pub fn new(cfg: ReplayConfig, store: Arc<MetricsSeriesStore>, time: Arc<dyn Clock>) -> Self {
        let now = time.now();
        let state = ReplayState {
            mode: cfg.initial_mode,
            started_at: now,
            series: store.series_for(cfg.initial_mode),
            generation: 0,
            completion_announced: AtomicBool::new(false),
        };
        Self {
            clock: ReplayClock::new(cfg.sampling_interval, cfg.policy),
            cfg,
            time,
            store,
            state: RwLock::new(Arc::new(state)),
            switch: Mutex::new(()),
            bus: ReplayBus::default(),
            booted_at: now,
        }
    }

    /// Preloads every mode, then starts replaying the initial mode.
    pub async fn start(
        cfg: ReplayConfig,
        store: Arc<MetricsSeriesStore>,
        time: Arc<dyn Clock>,
    ) -> Self {
        store.preload().await;
        let engine = Self::new(cfg, store, time);
        let state = engine.state.read().clone();
        tracing::info!(
            mode = %state.mode,
            len = state.series.len(),
            policy = %engine.clock.policy(),
            interval_ms = engine.clock.sampling_interval().as_millis() as u64,
            "replay started"
        );
        engine
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.cfg
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.clock.policy()
    }

    pub fn mode(&self) -> Mode {
        self.state.read().mode
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.bus.subscribe()
    }

    fn read(&self) -> Reading {
        let state = self.state.read().clone();
        let now = self.time.now();
        let clock = self.clock.reading(state.series.len(), state.started_at, now);
        if clock.completed && !state.completion_announced.swap(true, Ordering::AcqRel) {
            metrics::counter!("replay.completed", "mode" => state.mode.as_str()).increment(1);
            tracing::info!(
                mode = %state.mode,
                generation = state.generation,
                total = state.series.len(),
                "replay reached last sample"
            );
            self.bus.publish(ReplayEvent::Completed {
                mode: state.mode,
                generation: state.generation,
                total: state.series.len(),
            });
        }
        Reading { state, clock, now }
    }

    pub fn current(&self, kind: SeriesKind) -> Result<Sample, ReplayError> {
        let reading = self.read();
        match kind {
            SeriesKind::Loss => reading.loss().cloned().map(Sample::Loss),
            SeriesKind::Resource => reading.resource().cloned().map(Sample::Resource),
        }
    }

    pub fn current_loss(&self) -> Result<LossSample, ReplayError> {
        self.read().loss().cloned()
    }

    pub fn current_resource(&self) -> Result<ResourceSample, ReplayError> {
        self.read().resource().cloned()
    }

    /// The most recent `last_n` samples up to and including the current one.
    /// Recomputed from the clock on every call.
    pub fn window(&self, kind: SeriesKind, last_n: i64) -> Result<Window, ReplayError> {
        if last_n <= 0 {
            return Err(ReplayError::InvalidArgument(format!(
                "last_n must be a positive integer, got {last_n}"
            )));
        }
        let last_n = usize::try_from(last_n).unwrap_or(usize::MAX);
        let reading = self.read();
        let index = reading.clock.index;
        match kind {
            SeriesKind::Loss => {
                reading.loss()?;
                Ok(Window::Loss(window_of(reading.state.series.loss(), index, last_n)))
            }
            SeriesKind::Resource => {
                reading.resource()?;
                Ok(Window::Resource(window_of(
                    reading.state.series.resource(),
                    index,
                    last_n,
                )))
            }
        }
    }

    pub fn status(&self, job_id: &str) -> Result<TrainingStatus, ReplayError> {
        let reading = self.read();
        let current = reading.loss()?;
        let total = reading.state.series.len_of(SeriesKind::Loss);
        let progress = progress_percent(reading.clock.index, total);
        let elapsed_ms = reading.clock.elapsed_ms;
        let remaining_ms = estimate_remaining_ms(elapsed_ms, progress);
        Ok(TrainingStatus {
            job_id: job_id.to_string(),
            status: if reading.clock.completed {
                RunState::Completed
            } else {
                RunState::Running
            },
            current_epoch: current.epoch,
            total_epochs: self.cfg.total_epochs,
            progress_percent: round1(progress),
            elapsed_time: format_hms(elapsed_ms),
            estimated_remaining: format_hms(remaining_ms),
            elapsed_seconds: elapsed_ms as f64 / 1_000.0,
            estimated_remaining_seconds: remaining_ms as f64 / 1_000.0,
            current_step: current.step,
            total_steps: total,
        })
    }

    pub fn summary(&self) -> Result<TrainingSummary, ReplayError> {
        let reading = self.read();
        let loss = reading.loss()?;
        let res = reading.resource()?;
        let index = reading.clock.index;
        Ok(TrainingSummary {
            training_mode: reading.state.mode,
            is_completed: reading.clock.completed,
            current_iteration: index,
            current_epoch: loss.epoch,
            current_step: loss.step,
            current_train_loss: loss.train_loss,
            current_val_loss: loss.validation_loss,
            gpu_utilization: res.gpu_percent,
            memory_usage: MemoryUsage {
                ram_used: res.ram_used_gb,
                ram_total: res.ram_total_gb,
                vram_used: res.vram_used_gb,
                vram_total: res.vram_total_gb,
            },
            temperatures: Temperatures {
                gpu: res.gpu_temp,
                cpu: res.cpu_temp,
            },
            elapsed_time: format_hms(reading.clock.elapsed_ms),
            data_point: format!("{}/{}", index + 1, reading.state.series.len()),
        })
    }

    pub fn mode_info(&self) -> ModeInfo {
        let reading = self.read();
        ModeInfo {
            mode: reading.state.mode,
            data_points: reading.state.series.len_of(SeriesKind::Loss),
            resource_points: reading.state.series.len_of(SeriesKind::Resource),
            is_completed: reading.clock.completed,
            current_iteration: reading.clock.index,
        }
    }

    pub fn health(&self) -> ReplayHealth {
        let reading = self.read();
        let uptime_ms = (reading.now - self.booted_at).num_milliseconds().max(0);
        ReplayHealth {
            message: "Training Monitor API",
            status: "running",
            training_mode: reading.state.mode,
            policy: self.clock.policy().to_string(),
            data_points: reading.state.series.len_of(SeriesKind::Loss),
            is_completed: reading.clock.completed,
            current_iteration: reading.clock.index,
            uptime_seconds: uptime_ms as f64 / 1_000.0,
        }
    }

    pub fn live_metrics(&self) -> Result<LiveMetrics, ReplayError> {
        let reading = self.read();
        let loss = reading.loss()?;
        Ok(LiveMetrics {
            current_loss: loss.train_loss,
            validation_loss: loss.validation_loss,
            current_epoch: loss.epoch,
            current_step: loss.step,
            last_updated: reading.now,
        })
    }

    /// Whether the active replay has run past its last sample.
    pub fn is_completed(&self) -> bool {
        self.read().clock.completed
    }

    pub fn stream_frame(&self, job_id: &str) -> Result<StreamFrame, ReplayError> {
        let reading = self.read();
        let training = reading.loss()?.clone();
        let resources = reading.resource()?.clone();
        Ok(StreamFrame {
            job_id: job_id.to_string(),
            timestamp: reading.now,
            training_mode: reading.state.mode,
            is_completed: reading.clock.completed,
            training,
            resources,
            iteration: reading.clock.index,
            total: reading.state.series.len(),
        })
    }

    /// Switch to `mode` (which may equal the current one), reload its series
    /// and restart the clock. On failure the previous replay is untouched.
    pub async fn set_mode(&self, mode: &str) -> Result<ModeChange, ReplayError> {
        let mode: Mode = mode.parse()?;
        self.switch_to(mode).await
    }

    pub async fn switch_to(&self, mode: Mode) -> Result<ModeChange, ReplayError> {
        let _serial = self.switch.lock().await;
        let series = self.store.load(mode).await?;
        let started_at = self.time.now();
        let generation = {
            let mut slot = self.state.write();
            let generation = slot.generation + 1;
            *slot = Arc::new(ReplayState {
                mode,
                started_at,
                series: series.clone(),
                generation,
                completion_announced: AtomicBool::new(false),
            });
            generation
        };
        metrics::counter!("replay.mode_switch", "mode" => mode.as_str()).increment(1);
        tracing::info!(%mode, generation, len = series.len(), "replay mode set");
        self.bus.publish(ReplayEvent::ModeChanged {
            mode,
            generation,
            started_at,
        });
        Ok(ModeChange {
            message: format!("Training mode set to {mode}"),
            mode,
            reset: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{synthetic_loss, synthetic_resource, StaticSeriesSource};
    use infra_clock::ManualClock;

    struct Rig {
        engine: ReplayEngine,
        clock: Arc<ManualClock>,
        source: Arc<StaticSeriesSource>,
    }

    async fn rig_with(source: StaticSeriesSource, policy: ReplayPolicy) -> Rig {
        let source = Arc::new(source);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MetricsSeriesStore::new(source.clone(), Duration::from_secs(1)));
        let cfg = ReplayConfig {
            policy,
            ..ReplayConfig::default()
        };
        let engine = ReplayEngine::start(cfg, store, clock.clone()).await;
        Rig {
            engine,
            clock,
            source,
        }
    }

    async fn rig(manual: usize, automated: usize) -> Rig {
        rig_with(StaticSeriesSource::synthetic(manual, automated), ReplayPolicy::Clamp).await
    }

    #[tokio::test]
    async fn starts_at_index_zero_in_manual_mode() {
        let rig = rig(10, 10).await;
        assert_eq!(rig.engine.mode(), Mode::Manual);
        let loss = rig.engine.current_loss().expect("loss");
        assert_eq!(loss.iteration, 0);
        let info = rig.engine.mode_info();
        assert_eq!(info.current_iteration, 0);
        assert!(!info.is_completed);
    }

    #[tokio::test]
    async fn status_midway_and_at_end() {
        let rig = rig(10, 10).await;

        rig.clock.advance(Duration::from_secs(5));
        let status = rig.engine.status("job-1").expect("status");
        assert_eq!(status.status, RunState::Running);
        assert_eq!(status.progress_percent, 20.0);
        assert_eq!(status.elapsed_time, "0:00:05");
        assert_eq!(status.total_steps, 10);
        assert_eq!(status.total_epochs, 3);
        assert_eq!(status.estimated_remaining, "0:00:20");

        rig.clock.advance(Duration::from_secs(24));
        let status = rig.engine.status("job-1").expect("status");
        assert_eq!(status.status, RunState::Completed);
        assert_eq!(status.progress_percent, 100.0);
        assert_eq!(status.estimated_remaining_seconds, 0.0);
        assert_eq!(rig.engine.current_loss().expect("loss").iteration, 9);
    }

    #[tokio::test]
    async fn clamp_holds_last_sample_long_after_end() {
        let rig = rig(10, 10).await;
        rig.clock.advance(Duration::from_secs(3_600));
        assert_eq!(rig.engine.current_loss().expect("loss").iteration, 9);
        assert!(rig.engine.is_completed());
        let status = rig.engine.status("j").expect("status");
        assert!(status.progress_percent <= 100.0);
    }

    #[tokio::test]
    async fn loop_policy_wraps_and_stays_running() {
        let rig = rig_with(StaticSeriesSource::synthetic(10, 10), ReplayPolicy::Loop).await;
        rig.clock.advance(Duration::from_secs(33));
        assert_eq!(rig.engine.current_loss().expect("loss").iteration, 1);
        let status = rig.engine.status("j").expect("status");
        assert_eq!(status.status, RunState::Running);
        assert!(!rig.engine.is_completed());
    }

    #[tokio::test]
    async fn window_is_bounded_by_index_and_last_n() {
        let rig = rig(30, 30).await;
        rig.clock.advance(Duration::from_secs(12));

        let window = rig.engine.window(SeriesKind::Loss, 20).expect("window");
        assert_eq!(window.len(), 5);
        let Window::Loss(rows) = window else {
            panic!("expected loss window");
        };
        assert_eq!(rows.first().map(|r| r.iteration), Some(0));
        assert_eq!(rows.last().map(|r| r.iteration), Some(4));

        let window = rig.engine.window(SeriesKind::Resource, 2).expect("window");
        let Window::Resource(rows) = window else {
            panic!("expected resource window");
        };
        assert_eq!(rows.iter().map(|r| r.iteration).collect::<Vec<_>>(), vec![3, 4]);

        for last_n in 1..40 {
            let len = rig.engine.window(SeriesKind::Loss, last_n).expect("window").len();
            assert_eq!(len, (last_n as usize).min(5));
        }
    }

    #[tokio::test]
    async fn window_rejects_non_positive_last_n() {
        let rig = rig(5, 5).await;
        for bad in [0, -3] {
            let err = rig.engine.window(SeriesKind::Loss, bad).expect_err("invalid");
            assert!(matches!(err, ReplayError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn window_moves_with_time() {
        let rig = rig(30, 30).await;
        let first = rig.engine.window(SeriesKind::Loss, 3).expect("window");
        rig.clock.advance(Duration::from_secs(9));
        let later = rig.engine.window(SeriesKind::Loss, 3).expect("window");
        assert_eq!(first.len(), 1);
        assert_eq!(later.len(), 3);
        assert_ne!(first, later);
    }

    #[tokio::test]
    async fn empty_series_is_unavailable() {
        let rig = rig_with(StaticSeriesSource::new(), ReplayPolicy::Clamp).await;
        rig.clock.advance(Duration::from_secs(30));
        for kind in [SeriesKind::Loss, SeriesKind::Resource] {
            let err = rig.engine.current(kind).expect_err("empty");
            assert!(matches!(err, ReplayError::ServiceUnavailable(_)));
            assert!(matches!(
                rig.engine.window(kind, 5),
                Err(ReplayError::ServiceUnavailable(_))
            ));
        }
        assert!(matches!(rig.engine.summary(), Err(ReplayError::ServiceUnavailable(_))));
        assert!(matches!(rig.engine.status("j"), Err(ReplayError::ServiceUnavailable(_))));
        assert!(!rig.engine.is_completed());
    }

    #[tokio::test]
    async fn summary_needs_both_series() {
        let source = StaticSeriesSource::new();
        source.put(Mode::Manual, Some(synthetic_loss(8, 1.0)), None);
        let rig = rig_with(source, ReplayPolicy::Clamp).await;
        assert!(rig.engine.current_loss().is_ok());
        assert!(rig.engine.current_resource().is_err());
        assert!(matches!(rig.engine.summary(), Err(ReplayError::ServiceUnavailable(_))));
        assert!(rig.engine.stream_frame("j").is_err());
    }

    #[tokio::test]
    async fn summary_combines_current_points() {
        let rig = rig(10, 10).await;
        rig.clock.advance(Duration::from_secs(7));
        let summary = rig.engine.summary().expect("summary");
        let loss = rig.engine.current_loss().expect("loss");
        let res = rig.engine.current_resource().expect("res");
        assert_eq!(summary.current_iteration, 2);
        assert_eq!(summary.data_point, "3/10");
        assert_eq!(summary.current_train_loss, loss.train_loss);
        assert_eq!(summary.gpu_utilization, res.gpu_percent);
        assert_eq!(summary.temperatures.gpu, res.gpu_temp);
        assert_eq!(summary.training_mode, Mode::Manual);
    }

    #[tokio::test]
    async fn mode_switch_restarts_from_zero() {
        let rig = rig(40, 25).await;
        rig.clock.advance(Duration::from_secs(50));
        assert_eq!(rig.engine.current_loss().expect("loss").iteration, 16);

        let change = rig.engine.set_mode("automated").await.expect("switch");
        assert_eq!(change.mode, Mode::Automated);
        assert!(change.reset);
        assert_eq!(change.message, "Training mode set to automated");

        let info = rig.engine.mode_info();
        assert_eq!(info.mode, Mode::Automated);
        assert_eq!(info.data_points, 25);
        assert_eq!(info.current_iteration, 0);
        assert!(!info.is_completed);
        let expected = synthetic_loss(25, 1.6);
        assert_eq!(rig.engine.current_loss().expect("loss"), expected[0]);
    }

    #[tokio::test]
    async fn repeated_switch_to_same_mode_resets_each_time() {
        let rig = rig(10, 10).await;
        rig.clock.advance(Duration::from_secs(100));
        assert!(rig.engine.is_completed());

        for _ in 0..2 {
            rig.engine.set_mode("manual").await.expect("switch");
            let info = rig.engine.mode_info();
            assert_eq!(info.current_iteration, 0);
            assert!(!info.is_completed);
        }
    }

    #[tokio::test]
    async fn invalid_mode_leaves_state_intact() {
        let rig = rig(10, 10).await;
        rig.clock.advance(Duration::from_secs(6));
        let err = rig.engine.set_mode("Turbo").await.expect_err("invalid");
        assert!(matches!(err, ReplayError::InvalidArgument(_)));
        assert_eq!(rig.engine.mode(), Mode::Manual);
        assert_eq!(rig.engine.mode_info().current_iteration, 2);
    }

    #[tokio::test]
    async fn failed_reload_leaves_state_intact() {
        let source = Arc::new(
            StaticSeriesSource::synthetic(10, 10).with_delay(Duration::from_millis(200)),
        );
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MetricsSeriesStore::new(source, Duration::from_millis(20)));
        let cfg = ReplayConfig::default();
        let engine = ReplayEngine::new(cfg, store, clock.clone());
        clock.advance(Duration::from_secs(9));
        let before = engine.mode_info();

        let err = engine.set_mode("automated").await.expect_err("timeout");
        assert!(matches!(err, ReplayError::ServiceUnavailable(_)));
        assert_eq!(engine.mode_info(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_pair_one_mode_with_another_series() {
        let source = Arc::new(StaticSeriesSource::synthetic(40, 25));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MetricsSeriesStore::new(source, Duration::from_secs(1)));
        let engine = Arc::new(ReplayEngine::start(ReplayConfig::default(), store, clock.clone()).await);
        let stop = Arc::new(AtomicBool::new(false));
        let expected = |mode: Mode| match mode {
            Mode::Manual => 40,
            Mode::Automated => 25,
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let engine = engine.clone();
                let stop = stop.clone();
                std::thread::spawn(move || {
                    let mut reads = 0_u64;
                    loop {
                        let info = engine.mode_info();
                        assert_eq!(info.data_points, expected(info.mode));
                        assert_eq!(info.resource_points, expected(info.mode));
                        let frame = engine.stream_frame("job-reader").expect("frame");
                        assert_eq!(frame.total, expected(frame.training_mode));
                        assert!(frame.iteration < frame.total);
                        reads += 1;
                        if stop.load(Ordering::Acquire) {
                            return reads;
                        }
                    }
                })
            })
            .collect();

        for i in 0..200 {
            let mode = if i % 2 == 0 { "automated" } else { "manual" };
            clock.advance(Duration::from_millis(1_500));
            engine.set_mode(mode).await.expect("switch");
        }
        stop.store(true, Ordering::Release);
        for reader in readers {
            assert!(reader.join().expect("reader thread") > 0);
        }
    }

    #[tokio::test]
    async fn reload_picks_up_new_data() {
        let rig = rig(10, 10).await;
        rig.source.put(
            Mode::Manual,
            Some(synthetic_loss(4, 1.0)),
            Some(synthetic_resource(4, 0.0)),
        );
        rig.engine.set_mode("manual").await.expect("switch");
        assert_eq!(rig.engine.mode_info().data_points, 4);
    }

    #[tokio::test]
    async fn events_follow_switch_and_completion() {
        let rig = rig(3, 3).await;
        let mut rx = rig.engine.subscribe();

        rig.clock.advance(Duration::from_secs(7));
        assert!(rig.engine.is_completed());
        assert!(rig.engine.is_completed());
        assert_eq!(
            rx.recv().await.expect("recv"),
            ReplayEvent::Completed {
                mode: Mode::Manual,
                generation: 0,
                total: 3
            }
        );

        rig.engine.set_mode("automated").await.expect("switch");
        match rx.recv().await.expect("recv") {
            ReplayEvent::ModeChanged {
                mode, generation, ..
            } => {
                assert_eq!(mode, Mode::Automated);
                assert_eq!(generation, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn live_metrics_mirror_current_loss() {
        let rig = rig(10, 10).await;
        rig.clock.advance(Duration::from_secs(4));
        let live = rig.engine.live_metrics().expect("live");
        let loss = rig.engine.current_loss().expect("loss");
        assert_eq!(live.current_loss, loss.train_loss);
        assert_eq!(live.current_step, loss.step);
        assert_eq!(live.last_updated, rig.clock.now());
    }

    #[tokio::test]
    async fn determinism_at_fixed_instant() {
        let rig = rig(50, 50).await;
        rig.clock.advance(Duration::from_millis(41_500));
        let a = rig.engine.mode_info();
        let b = rig.engine.mode_info();
        assert_eq!(a, b);
        assert_eq!(a.current_iteration, 13);
    }
}
