use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use core_types::{LossSample, Mode, ReplayError, ResourceSample, SeriesKind};
use parking_lot::RwLock;

use crate::source::SeriesSource;

/// Both recorded series for one mode. Immutable once built.
///
/// When both series are present they are cut to the shorter length so a
/// single replay index addresses both. A series whose source was missing
/// stays empty and the other keeps its full length; projections that need
/// the empty one report it unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSeries {
    mode: Mode,
    loss: Vec<LossSample>,
    resource: Vec<ResourceSample>,
}

impl ModeSeries {
    pub fn new(mode: Mode, mut loss: Vec<LossSample>, mut resource: Vec<ResourceSample>) -> Self {
        if !loss.is_empty() && !resource.is_empty() && loss.len() != resource.len() {
            let keep = loss.len().min(resource.len());
            tracing::warn!(
                %mode,
                loss_len = loss.len(),
                resource_len = resource.len(),
                keep,
                "series length mismatch; truncating to shorter"
            );
            loss.truncate(keep);
            resource.truncate(keep);
        }
        Self {
            mode,
            loss,
            resource,
        }
    }

    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            loss: Vec::new(),
            resource: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn loss(&self) -> &[LossSample] {
        &self.loss
    }

    pub fn resource(&self) -> &[ResourceSample] {
        &self.resource
    }

    pub fn len_of(&self, kind: SeriesKind) -> usize {
        match kind {
            SeriesKind::Loss => self.loss.len(),
            SeriesKind::Resource => self.resource.len(),
        }
    }

    /// Replay length: the common length, or the length of whichever series
    /// is present.
    pub fn len(&self) -> usize {
        self.loss.len().max(self.resource.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loaded series per mode. Populated by `load`, read by the engine through
/// `series_for`; a reload replaces a mode's series wholesale.
pub struct MetricsSeriesStore {
    source: Arc<dyn SeriesSource>,
    load_timeout: Duration,
    series: RwLock<HashMap<Mode, Arc<ModeSeries>>>,
}

impl MetricsSeriesStore {
    pub fn new(source: Arc<dyn SeriesSource>, load_timeout: Duration) -> Self {
        Self {
            source,
            load_timeout,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Load one mode from the source. Missing or unreadable series become
    /// empty. Only a timeout is an error, and then the previously loaded
    /// series for the mode stays in place.
    pub async fn load(&self, mode: Mode) -> Result<Arc<ModeSeries>, ReplayError> {
        let fetched = match tokio::time::timeout(self.load_timeout, self.fetch(mode)).await {
            Ok(series) => Arc::new(series),
            Err(_) => {
                metrics::counter!("replay.load_timeout", "mode" => mode.as_str()).increment(1);
                tracing::error!(
                    %mode,
                    timeout_ms = self.load_timeout.as_millis() as u64,
                    "series load timed out; keeping previous series"
                );
                return Err(ReplayError::ServiceUnavailable(format!(
                    "loading {mode} series timed out"
                )));
            }
        };
        for kind in [SeriesKind::Loss, SeriesKind::Resource] {
            metrics::gauge!("replay.series_len", "mode" => mode.as_str(), "kind" => kind.as_str())
                .set(fetched.len_of(kind) as f64);
        }
        self.series.write().insert(mode, fetched.clone());
        Ok(fetched)
    }

    /// Load every mode; failures are logged and leave that mode empty.
    pub async fn preload(&self) {
        for mode in Mode::ALL {
            if let Err(err) = self.load(mode).await {
                tracing::warn!(%mode, %err, "preload failed");
            }
        }
    }

    pub fn series_for(&self, mode: Mode) -> Arc<ModeSeries> {
        self.series
            .read()
            .get(&mode)
            .cloned()
            .unwrap_or_else(|| Arc::new(ModeSeries::empty(mode)))
    }

    pub fn length(&self, mode: Mode) -> usize {
        self.series.read().get(&mode).map(|s| s.len()).unwrap_or(0)
    }

    async fn fetch(&self, mode: Mode) -> ModeSeries {
        let (loss, resource) = tokio::join!(
            self.source.load_loss(mode),
            self.source.load_resource(mode)
        );
        let loss = self.settle(mode, SeriesKind::Loss, loss);
        let resource = self.settle(mode, SeriesKind::Resource, resource);
        ModeSeries::new(mode, loss, resource)
    }

    fn settle<T>(&self, mode: Mode, kind: SeriesKind, loaded: anyhow::Result<Option<Vec<T>>>) -> Vec<T> {
        let origin = self.source.describe(mode, kind);
        match loaded {
            Ok(Some(rows)) => {
                tracing::info!(%mode, %kind, len = rows.len(), %origin, "series loaded");
                rows
            }
            Ok(None) => {
                tracing::warn!(%mode, %kind, %origin, "series source not found");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(%mode, %kind, %origin, err = %format!("{err:#}"), "series load failed");
                Vec::new()
            }
        }
    }
}
