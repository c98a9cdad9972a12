use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use core_types::Mode;
use infra_clock::ReplayPolicy;
use job_catalog::CatalogConfig;
use replay_engine::ReplayConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DataSourceKind {
    Files,
    Synthetic,
}

#[derive(Debug, Clone)]
pub(crate) struct DataConfig {
    pub(crate) source: DataSourceKind,
    pub(crate) root: PathBuf,
    pub(crate) loss_file: String,
    pub(crate) resource_file: String,
    /// Samples per mode when `source = "synthetic"`.
    pub(crate) synthetic_len: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Files,
            root: PathBuf::from("data"),
            loss_file: "training_metrics_{mode}.csv".to_string(),
            resource_file: "resource_metrics_{mode}.csv".to_string(),
            synthetic_len: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MonitorConfig {
    pub(crate) bind: String,
    pub(crate) replay: ReplayConfig,
    pub(crate) data: DataConfig,
    pub(crate) catalog: CatalogConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8001".to_string(),
            replay: ReplayConfig::default(),
            data: DataConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

/// Values from the command line or its environment fallbacks. They win over
/// the file.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub(crate) bind: Option<String>,
    pub(crate) data_root: Option<PathBuf>,
    pub(crate) catalog_root: Option<PathBuf>,
    pub(crate) sampling_interval_ms: Option<u64>,
    pub(crate) policy: Option<ReplayPolicy>,
}

pub(crate) fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("configs/monitor.toml"))
}

#[derive(Debug, Deserialize, Default)]
struct MonitorFile {
    server: Option<ServerSection>,
    replay: Option<ReplaySection>,
    data: Option<DataSection>,
    catalog: Option<CatalogSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerSection {
    bind: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ReplaySection {
    sampling_interval_ms: Option<u64>,
    policy: Option<ReplayPolicy>,
    total_epochs: Option<u32>,
    initial_mode: Option<Mode>,
    default_window: Option<usize>,
    load_timeout_ms: Option<u64>,
    stream_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DataSection {
    source: Option<DataSourceKind>,
    root: Option<PathBuf>,
    loss_file: Option<String>,
    resource_file: Option<String>,
    synthetic_len: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct CatalogSection {
    root: Option<PathBuf>,
    current_jobs: Option<String>,
    past_jobs: Option<String>,
    settle_completed: Option<bool>,
}

/// Missing or unreadable files fall back to defaults.
pub(crate) fn load_monitor_config(path: &Path) -> MonitorConfig {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::info!(path = %path.display(), %err, "monitor config not read; using defaults");
            return MonitorConfig::default();
        }
    };
    match parse_monitor_config(&raw) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "monitor config loaded");
            cfg
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "monitor config invalid; using defaults");
            MonitorConfig::default()
        }
    }
}

pub(crate) fn parse_monitor_config(raw: &str) -> Result<MonitorConfig, toml::de::Error> {
    let parsed = toml::from_str::<MonitorFile>(raw)?;
    let mut cfg = MonitorConfig::default();

    if let Some(server) = parsed.server {
        if let Some(v) = server.bind.filter(|v| !v.trim().is_empty()) {
            cfg.bind = v;
        }
    }

    if let Some(replay) = parsed.replay {
        let r = &mut cfg.replay;
        if let Some(v) = replay.sampling_interval_ms {
            r.sampling_interval = Duration::from_millis(v.max(1));
        }
        if let Some(v) = replay.policy {
            r.policy = v;
        }
        if let Some(v) = replay.total_epochs {
            r.total_epochs = v.max(1);
        }
        if let Some(v) = replay.initial_mode {
            r.initial_mode = v;
        }
        if let Some(v) = replay.default_window {
            r.default_window = v.max(1);
        }
        if let Some(v) = replay.load_timeout_ms {
            r.load_timeout = Duration::from_millis(v.clamp(100, 120_000));
        }
        if let Some(v) = replay.stream_interval_ms {
            r.stream_interval = Duration::from_millis(v.clamp(50, 60_000));
        }
    }

    if let Some(data) = parsed.data {
        let d = &mut cfg.data;
        if let Some(v) = data.source {
            d.source = v;
        }
        if let Some(v) = data.root {
            d.root = v;
        }
        if let Some(v) = data.loss_file.filter(|v| !v.trim().is_empty()) {
            d.loss_file = v;
        }
        if let Some(v) = data.resource_file.filter(|v| !v.trim().is_empty()) {
            d.resource_file = v;
        }
        if let Some(v) = data.synthetic_len {
            d.synthetic_len = v.clamp(1, 100_000);
        }
    }

    if let Some(catalog) = parsed.catalog {
        let c = &mut cfg.catalog;
        if let Some(v) = catalog.root {
            c.root = v;
        }
        if let Some(v) = catalog.current_jobs.filter(|v| !v.trim().is_empty()) {
            c.current_jobs = v;
        }
        if let Some(v) = catalog.past_jobs.filter(|v| !v.trim().is_empty()) {
            c.past_jobs = v;
        }
        if let Some(v) = catalog.settle_completed {
            c.settle_completed = v;
        }
    }

    Ok(cfg)
}

pub(crate) fn apply_overrides(cfg: &mut MonitorConfig, overrides: &Overrides) {
    if let Some(v) = overrides.bind.as_ref().filter(|v| !v.trim().is_empty()) {
        cfg.bind = v.clone();
    }
    if let Some(v) = &overrides.data_root {
        cfg.data.root = v.clone();
    }
    if let Some(v) = &overrides.catalog_root {
        cfg.catalog.root = v.clone();
    }
    if let Some(v) = overrides.sampling_interval_ms {
        cfg.replay.sampling_interval = Duration::from_millis(v.max(1));
    }
    if let Some(v) = overrides.policy {
        cfg.replay.policy = v;
    }
}
