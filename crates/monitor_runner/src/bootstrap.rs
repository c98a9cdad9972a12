use std::sync::Arc;

use anyhow::{Context, Result};
use core_types::CatalogStore;
use infra_clock::SystemClock;
use job_catalog::{JobStatusOverlay, JsonCatalogStore};
use observability::{init_metrics, init_tracing};
use replay_engine::{
    FileSeriesSource, MetricsSeriesStore, ReplayEngine, ReplayEvent, SeriesSource,
    StaticSeriesSource,
};
use tokio::sync::broadcast;

use crate::config_loader::{apply_overrides, config_path, load_monitor_config, DataConfig, DataSourceKind};
use crate::control_api::build_router;
use crate::state::AppState;
use crate::Cli;

pub(crate) async fn async_main(cli: Cli) -> Result<()> {
    let _guard = init_tracing("monitor_runner");
    let prometheus = init_metrics();

    let path = config_path(cli.config.clone());
    let mut cfg = load_monitor_config(&path);
    apply_overrides(&mut cfg, &cli.overrides());

    let store = Arc::new(MetricsSeriesStore::new(
        series_source(&cfg.data),
        cfg.replay.load_timeout,
    ));
    let engine = Arc::new(ReplayEngine::start(cfg.replay.clone(), store, Arc::new(SystemClock)).await);
    spawn_event_log(engine.subscribe());

    let catalog: Arc<dyn CatalogStore> = Arc::new(JsonCatalogStore::new(&cfg.catalog));
    let jobs = Arc::new(
        JobStatusOverlay::new(engine.clone(), catalog)
            .with_settle_completed(cfg.catalog.settle_completed),
    );

    let app = build_router(AppState {
        engine,
        jobs,
        prometheus,
    });
    let listener = tokio::net::TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("bind {}", cfg.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "monitor api started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve monitor api")?;
    tracing::info!("monitor api stopped");
    Ok(())
}

fn series_source(data: &DataConfig) -> Arc<dyn SeriesSource> {
    match data.source {
        DataSourceKind::Files => {
            tracing::info!(root = %data.root.display(), "replaying series from files");
            Arc::new(FileSeriesSource::new(
                data.root.clone(),
                data.loss_file.clone(),
                data.resource_file.clone(),
            ))
        }
        DataSourceKind::Synthetic => {
            tracing::info!(len = data.synthetic_len, "replaying synthetic series");
            Arc::new(StaticSeriesSource::synthetic(
                data.synthetic_len,
                data.synthetic_len,
            ))
        }
    }
}

fn spawn_event_log(mut events: broadcast::Receiver<ReplayEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ReplayEvent::ModeChanged {
                    mode, generation, ..
                }) => tracing::debug!(%mode, generation, "replay event: mode changed"),
                Ok(ReplayEvent::Completed {
                    mode,
                    generation,
                    total,
                }) => tracing::debug!(%mode, generation, total, "replay event: completed"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "replay event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
