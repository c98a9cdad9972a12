use std::sync::OnceLock;

use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `FTDP_LOG_FORMAT=json` selects JSON lines; anything else is text.
    pub fn from_env() -> Self {
        match std::env::var("FTDP_LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

pub fn init_tracing(service_name: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{service_name}=info,info")));

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_target(true);
    let installed = match LogFormat::from_env() {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Text => builder.with_thread_ids(true).try_init(),
    };
    if installed.is_err() {
        return None;
    }

    Some(guard)
}

/// Installs the Prometheus recorder on first call; later calls return the
/// same handle.
pub fn init_metrics() -> PrometheusHandle {
    PROM_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("install prometheus recorder");
            describe_replay_metrics();
            handle
        })
        .clone()
}

fn describe_replay_metrics() {
    describe_counter!("replay.mode_switch", "Accepted replay mode switches");
    describe_counter!(
        "replay.unavailable",
        "Projection requests refused because a series was empty"
    );
    describe_counter!("replay.load_timeout", "Series loads abandoned after the load timeout");
    describe_counter!("replay.completed", "Replays that reached their last sample");
    describe_counter!(
        "overlay.live_metrics_skipped",
        "Running jobs returned without live metrics"
    );
    describe_gauge!("replay.series_len", Unit::Count, "Samples loaded per mode and kind");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_text() {
        if std::env::var("FTDP_LOG_FORMAT").is_err() {
            assert_eq!(LogFormat::from_env(), LogFormat::Text);
        }
    }

    #[test]
    fn metrics_handle_is_shared() {
        let a = init_metrics();
        metrics::counter!("replay.mode_switch", "mode" => "manual").increment(1);
        let b = init_metrics();
        assert!(b.render().contains("replay_mode_switch"));
        drop(a);
    }
}
