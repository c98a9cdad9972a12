use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use core_types::{validate_uid, CatalogError, CatalogStore, JobListing, JobRecord};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub root: PathBuf,
    pub current_jobs: String,
    pub past_jobs: String,
    /// Mark running jobs completed once the replay finishes.
    pub settle_completed: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/catalog"),
            current_jobs: "current-jobs.json".to_string(),
            past_jobs: "past-jobs.json".to_string(),
            settle_completed: false,
        }
    }
}

/// Jobs kept in two JSON files: `current` for jobs not yet finished and
/// `past` for completed or failed ones. Both files hold `{"jobs": [...]}`;
/// a bare array is accepted on read.
pub struct JsonCatalogStore {
    current: PathBuf,
    past: PathBuf,
    /// Held for every read and write so a job being moved between files is
    /// never seen in both or neither.
    io: Mutex<()>,
}

impl JsonCatalogStore {
    pub fn new(cfg: &CatalogConfig) -> Self {
        Self {
            current: cfg.root.join(&cfg.current_jobs),
            past: cfg.root.join(&cfg.past_jobs),
            io: Mutex::new(()),
        }
    }

    async fn read_jobs(path: &Path) -> Result<Vec<JobRecord>, CatalogError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let doc: Value = serde_json::from_slice(&raw)
            .map_err(|e| CatalogError::InvalidRecord(format!("{}: {e}", path.display())))?;
        let entries = match doc {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("jobs") {
                Some(Value::Array(items)) => items,
                None => Vec::new(),
                Some(_) => {
                    return Err(CatalogError::InvalidRecord(format!(
                        "{}: \"jobs\" is not an array",
                        path.display()
                    )))
                }
            },
            _ => {
                return Err(CatalogError::InvalidRecord(format!(
                    "{}: expected an object or array",
                    path.display()
                )))
            }
        };

        let mut jobs = Vec::with_capacity(entries.len());
        for (pos, entry) in entries.into_iter().enumerate() {
            let uid = entry
                .get("uid")
                .and_then(Value::as_str)
                .unwrap_or("<missing>")
                .to_string();
            match serde_json::from_value::<JobRecord>(entry) {
                Ok(job) => jobs.push(job),
                Err(err) => tracing::warn!(
                    file = %path.display(),
                    pos,
                    %uid,
                    %err,
                    "skipping malformed job record"
                ),
            }
        }
        Ok(jobs)
    }

    async fn write_jobs(path: &Path, jobs: &[JobRecord]) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec_pretty(&serde_json::json!({ "jobs": jobs }))
            .map_err(|e| CatalogError::InvalidRecord(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// A job present in both files is left over from an interrupted move. The
/// copy modified last wins; the past copy wins a tie.
fn latest_copy(current: JobRecord, past: JobRecord) -> JobRecord {
    if current.last_modified > past.last_modified {
        current
    } else {
        past
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn load_job(&self, uid: &str) -> Result<JobRecord, CatalogError> {
        let _serial = self.io.lock().await;
        let current = Self::read_jobs(&self.current)
            .await?
            .into_iter()
            .find(|j| j.uid == uid);
        let past = Self::read_jobs(&self.past)
            .await?
            .into_iter()
            .find(|j| j.uid == uid);
        match (current, past) {
            (Some(current), Some(past)) => Ok(latest_copy(current, past)),
            (Some(job), None) | (None, Some(job)) => Ok(job),
            (None, None) => Err(CatalogError::NotFound(uid.to_string())),
        }
    }

    /// Upserts `record`. Terminal jobs live in the past file, everything
    /// else in the current file; a job changing sides is moved.
    async fn save_job(&self, record: &JobRecord) -> Result<(), CatalogError> {
        validate_uid(&record.uid).map_err(|e| CatalogError::InvalidRecord(e.to_string()))?;
        let mut stored = record.clone();
        stored.live_metrics = None;

        let _serial = self.io.lock().await;
        let mut current = Self::read_jobs(&self.current).await?;
        let mut past = Self::read_jobs(&self.past).await?;
        let was_current = current.iter().any(|j| j.uid == stored.uid);
        let was_past = past.iter().any(|j| j.uid == stored.uid);

        let (home, other, home_path, other_path, was_other) = if stored.status.is_terminal() {
            (&mut past, &mut current, &self.past, &self.current, was_current)
        } else {
            (&mut current, &mut past, &self.current, &self.past, was_past)
        };
        match home.iter_mut().find(|j| j.uid == stored.uid) {
            Some(slot) => *slot = stored,
            None => home.push(stored),
        }
        Self::write_jobs(home_path, home).await?;
        if was_other {
            other.retain(|j| j.uid != record.uid);
            Self::write_jobs(other_path, other).await?;
        }
        Ok(())
    }

    async fn list_jobs(&self) -> Result<JobListing, CatalogError> {
        let _serial = self.io.lock().await;
        Ok(JobListing {
            current: Self::read_jobs(&self.current).await?,
            past: Self::read_jobs(&self.past).await?,
        })
    }
}
