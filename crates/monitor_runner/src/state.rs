use std::sync::Arc;

use job_catalog::JobStatusOverlay;
use metrics_exporter_prometheus::PrometheusHandle;
use replay_engine::ReplayEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<ReplayEngine>,
    pub(crate) jobs: Arc<JobStatusOverlay>,
    pub(crate) prometheus: PrometheusHandle,
}
