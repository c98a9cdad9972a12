use std::sync::Arc;

use chrono::SecondsFormat;
use core_types::{CatalogError, CatalogStore, JobListing, JobRecord, JobStatus};
use replay_engine::ReplayEngine;

/// Decorates catalog lookups with the replay's view of a running job.
pub struct JobStatusOverlay {
    engine: Arc<ReplayEngine>,
    catalog: Arc<dyn CatalogStore>,
    settle_completed: bool,
}

impl JobStatusOverlay {
    pub fn new(engine: Arc<ReplayEngine>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            engine,
            catalog,
            settle_completed: false,
        }
    }

    pub fn with_settle_completed(mut self, enabled: bool) -> Self {
        self.settle_completed = enabled;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    /// Look up a job. Running jobs get `live_metrics`; when the replay has no
    /// data the job is still returned, just without them.
    pub async fn job(&self, uid: &str) -> Result<JobRecord, CatalogError> {
        let mut record = self.catalog.load_job(uid).await?;
        if !record.is_running() {
            return Ok(record);
        }
        if self.settle_completed && self.engine.is_completed() {
            return self.settle(record).await;
        }
        self.attach(&mut record);
        Ok(record)
    }

    pub async fn listing(&self) -> Result<JobListing, CatalogError> {
        self.catalog.list_jobs().await
    }

    pub fn attach(&self, record: &mut JobRecord) {
        match self.engine.live_metrics() {
            Ok(metrics) => record.live_metrics = Some(metrics),
            Err(err) => {
                metrics::counter!("overlay.live_metrics_skipped").increment(1);
                tracing::warn!(uid = %record.uid, %err, "could not add live metrics to job");
            }
        }
    }

    async fn settle(&self, mut record: JobRecord) -> Result<JobRecord, CatalogError> {
        let stamp = self.engine.now().to_rfc3339_opts(SecondsFormat::Millis, true);
        record.status = JobStatus::Completed;
        record.training.progress = 100.0;
        record.training.completed_at = Some(stamp.clone());
        record.last_modified = Some(stamp);
        record.live_metrics = None;
        self.catalog.save_job(&record).await?;
        tracing::info!(uid = %record.uid, "job settled as completed after replay finished");
        Ok(record)
    }
}
