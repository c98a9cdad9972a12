//! Time-indexed replay of recorded training telemetry.
//!
//! A [`MetricsSeriesStore`] holds the loss and resource series recorded for
//! each [`Mode`](core_types::Mode). The [`ReplayEngine`] maps elapsed
//! wall-clock time onto those series and serves point, window, status and
//! summary views of the "current" sample.

mod engine;
mod events;
mod source;
mod store;
mod views;

pub use engine::{ReplayConfig, ReplayEngine};
pub use events::{ReplayBus, ReplayEvent};
pub use source::{
    parse_csv, parse_jsonl, synthetic_loss, synthetic_resource, FileSeriesSource, SeriesSource,
    StaticSeriesSource,
};
pub use store::{MetricsSeriesStore, ModeSeries};
pub use views::{
    estimate_remaining_ms, format_hms, progress_percent, MemoryUsage, ModeChange, ModeInfo,
    ReplayHealth, RunState, Sample, StreamFrame, Temperatures, TrainingStatus, TrainingSummary,
    Window,
};
