use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use infra_clock::ReplayPolicy;

mod bootstrap;
mod config_loader;
mod control_api;
mod state;
mod stream;


#[derive(Parser, Debug)]
#[command(
    name = "monitor_runner",
    about = "Replays recorded training telemetry over HTTP and WebSocket",
    version
)]
pub(crate) struct Cli {
    /// TOML config file; defaults to configs/monitor.toml.
    #[arg(long, env = "FTDP_MONITOR_CONFIG_PATH")]
    config: Option<PathBuf>,
    #[arg(long, env = "FTDP_MONITOR_BIND")]
    bind: Option<String>,
    #[arg(long, env = "FTDP_DATA_ROOT")]
    data_root: Option<PathBuf>,
    #[arg(long, env = "FTDP_CATALOG_ROOT")]
    catalog_root: Option<PathBuf>,
    #[arg(long, env = "FTDP_SAMPLING_INTERVAL_MS")]
    sampling_interval_ms: Option<u64>,
    #[arg(long)]
    policy: Option<ReplayPolicy>,
}

impl Cli {
    fn overrides(&self) -> config_loader::Overrides {
        config_loader::Overrides {
            bind: self.bind.clone(),
            data_root: self.data_root.clone(),
            catalog_root: self.catalog_root.clone(),
            sampling_interval_ms: self.sampling_interval_ms,
            policy: self.policy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::async_main(Cli::parse()).await
}
