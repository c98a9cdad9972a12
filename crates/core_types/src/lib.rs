use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One recorded row of the loss curve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LossSample {
    pub iteration: u64,
    pub epoch: u32,
    pub step: u64,
    pub train_loss: f64,
    pub validation_loss: f64,
    pub learning_rate: f64,
    pub batch_size: u32,
}

/// One recorded row of host/accelerator utilization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSample {
    pub iteration: u64,
    pub cpu_percent: f64,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    pub gpu_percent: f64,
    pub vram_used_gb: f64,
    pub vram_total_gb: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub gpu_temp: i32,
    pub cpu_temp: i32,
    pub network_in_mbps: f64,
    pub network_out_mbps: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Manual,
    Automated,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Manual, Mode::Automated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Automated => "automated",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Mode::Manual),
            "automated" => Ok(Mode::Automated),
            other => Err(ReplayError::InvalidArgument(format!(
                "mode must be 'manual' or 'automated', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Loss,
    Resource,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Loss => "loss",
            SeriesKind::Resource => "resource",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplayError {
    /// Series not loaded or empty. Callers may retry or trigger a reload.
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
}

impl ReplayError {
    pub fn unavailable(kind: SeriesKind) -> Self {
        match kind {
            SeriesKind::Loss => Self::ServiceUnavailable("Training data not available".to_string()),
            SeriesKind::Resource => {
                Self::ServiceUnavailable("Resource data not available".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Queued,
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Loss-derived fields attached to a running job by the status overlay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveMetrics {
    pub current_loss: f64,
    pub validation_loss: f64,
    pub current_epoch: u32,
    pub current_step: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobTraining {
    #[serde(rename = "startedAt", default)]
    pub started_at: Option<String>,
    #[serde(rename = "completedAt", default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub progress: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A job as stored in the catalog files.
///
/// Fields the service reasons about are typed; everything else the
/// dashboard writes (`configuration`, `modelSaving`, `results`, ...) is
/// carried through `extra` untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: JobStatus,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub training: JobTraining,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_metrics: Option<LiveMetrics>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobRecord {
    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Job UID not found: {0}")]
    NotFound(String),
    #[error("invalid catalog record: {0}")]
    InvalidRecord(String),
    #[error("catalog io: {0}")]
    Io(#[from] std::io::Error),
}

/// Job lookup capability provided by the catalog layer.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_job(&self, uid: &str) -> Result<JobRecord, CatalogError>;
    async fn save_job(&self, record: &JobRecord) -> Result<(), CatalogError>;
    async fn list_jobs(&self) -> Result<JobListing, CatalogError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobListing {
    pub current: Vec<JobRecord>,
    pub past: Vec<JobRecord>,
}

pub fn validate_uid(uid: &str) -> Result<&str, ReplayError> {
    let len = uid.chars().count();
    if !(4..=50).contains(&len) {
        return Err(ReplayError::InvalidArgument(
            "Invalid UID format. Must be 4-50 characters".to_string(),
        ));
    }
    Ok(uid)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_and_display() {
        assert_eq!("manual".parse::<Mode>().expect("manual"), Mode::Manual);
        assert_eq!("automated".parse::<Mode>().expect("automated"), Mode::Automated);
        assert_eq!(Mode::Automated.to_string(), "automated");
        let err = "turbo".parse::<Mode>().expect_err("invalid mode");
        assert!(matches!(err, ReplayError::InvalidArgument(_)));
    }

    #[test]
    fn mode_is_case_sensitive() {
        assert!("Manual".parse::<Mode>().is_err());
    }

    #[test]
    fn job_record_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "uid": "job_1700000000000_abcd1234",
            "name": "llama sft",
            "status": "running",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "configuration": {"model": {"uid": "m-1"}},
            "training": {"startedAt": null, "progress": 12.5, "logs": []},
            "results": {"checkpoints": []}
        });
        let job: JobRecord = serde_json::from_value(raw).expect("decode");
        assert!(job.is_running());
        assert_eq!(job.training.progress, 12.5);
        assert!(job.extra.contains_key("configuration"));
        assert!(job.training.extra.contains_key("logs"));

        let back = serde_json::to_value(&job).expect("encode");
        assert_eq!(back["results"]["checkpoints"], serde_json::json!([]));
        assert!(back.get("live_metrics").is_none());
    }

    #[test]
    fn unknown_job_status_is_rejected() {
        let raw = serde_json::json!({"uid": "job-x", "status": "exploded"});
        assert!(serde_json::from_value::<JobRecord>(raw).is_err());
    }

    #[test]
    fn uid_length_bounds() {
        assert!(validate_uid("abc").is_err());
        assert!(validate_uid("abcd").is_ok());
        assert!(validate_uid(&"x".repeat(51)).is_err());
    }
}
