use chrono::{DateTime, Utc};
use core_types::{LossSample, Mode, ResourceSample};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Sample {
    Loss(LossSample),
    Resource(ResourceSample),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Window {
    Loss(Vec<LossSample>),
    Resource(Vec<ResourceSample>),
}

impl Window {
    pub fn len(&self) -> usize {
        match self {
            Window::Loss(rows) => rows.len(),
            Window::Resource(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrainingStatus {
    pub job_id: String,
    pub status: RunState,
    pub current_epoch: u32,
    pub total_epochs: u32,
    pub progress_percent: f64,
    pub elapsed_time: String,
    pub estimated_remaining: String,
    pub elapsed_seconds: f64,
    pub estimated_remaining_seconds: f64,
    pub current_step: u64,
    pub total_steps: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemoryUsage {
    pub ram_used: f64,
    pub ram_total: f64,
    pub vram_used: f64,
    pub vram_total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Temperatures {
    pub gpu: i32,
    pub cpu: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrainingSummary {
    pub training_mode: Mode,
    pub is_completed: bool,
    pub current_iteration: usize,
    pub current_epoch: u32,
    pub current_step: u64,
    pub current_train_loss: f64,
    pub current_val_loss: f64,
    pub gpu_utilization: f64,
    pub memory_usage: MemoryUsage,
    pub temperatures: Temperatures,
    pub elapsed_time: String,
    pub data_point: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModeInfo {
    pub mode: Mode,
    pub data_points: usize,
    pub resource_points: usize,
    pub is_completed: bool,
    pub current_iteration: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModeChange {
    pub message: String,
    pub mode: Mode,
    pub reset: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplayHealth {
    pub message: &'static str,
    pub status: &'static str,
    pub training_mode: Mode,
    pub policy: String,
    pub data_points: usize,
    pub is_completed: bool,
    pub current_iteration: usize,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamFrame {
    pub job_id: String,
    pub timestamp: DateTime<Utc>,
    pub training_mode: Mode,
    pub is_completed: bool,
    pub training: LossSample,
    pub resources: ResourceSample,
    pub iteration: usize,
    pub total: usize,
}

/// `(index + 1) / length` as a percentage in `[0, 100]`; 0 for an empty series.
pub fn progress_percent(index: usize, length: usize) -> f64 {
    if length == 0 {
        return 0.0;
    }
    ((index as f64 + 1.0) / length as f64 * 100.0).clamp(0.0, 100.0)
}

/// Linear extrapolation of the time left. Zero progress yields zero rather
/// than dividing by it.
pub fn estimate_remaining_ms(elapsed_ms: i64, progress_percent: f64) -> i64 {
    if progress_percent <= 0.0 {
        return 0;
    }
    let total = elapsed_ms as f64 / (progress_percent / 100.0);
    (total - elapsed_ms as f64).max(0.0).round() as i64
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// `H:MM:SS`, fractional seconds dropped.
pub fn format_hms(ms: i64) -> String {
    let total = ms.max(0) / 1_000;
    format!("{}:{:02}:{:02}", total / 3_600, (total % 3_600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bounds() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(1, 10), 20.0);
        assert_eq!(progress_percent(9, 10), 100.0);
        assert_eq!(progress_percent(50, 10), 100.0);
    }

    #[test]
    fn remaining_guards_zero_progress() {
        assert_eq!(estimate_remaining_ms(5_000, 0.0), 0);
        assert_eq!(estimate_remaining_ms(6_000, 20.0), 24_000);
        assert_eq!(estimate_remaining_ms(30_000, 100.0), 0);
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "0:00:00");
        assert_eq!(format_hms(5_999), "0:00:05");
        assert_eq!(format_hms(3_723_000), "1:02:03");
        assert_eq!(format_hms(-10), "0:00:00");
    }

    #[test]
    fn one_decimal_rounding() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.66), 66.7);
    }
}
