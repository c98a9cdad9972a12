use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use reqwest::{Client, Method};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "ftdp-monitor", about = "Training monitor operations CLI", version)]
struct Cli {
    #[arg(long, global = true, env = "FTDP_MONITOR_URL", default_value = "http://127.0.0.1:8001")]
    base_url: String,
    #[arg(long, global = true, default_value_t = 5_000)]
    timeout_ms: u64,
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay health (`GET /`).
    Health,
    Mode(ModeArgs),
    Status {
        job_id: String,
    },
    Summary,
    Losses(WindowArgs),
    Resources(WindowArgs),
    Job {
        uid: String,
    },
    /// Poll the summary and print one line per poll.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct ModeArgs {
    #[command(subcommand)]
    command: Option<ModeCommand>,
}

#[derive(Subcommand, Debug)]
enum ModeCommand {
    Set { mode: String },
}

#[derive(Args, Debug, Clone)]
struct WindowArgs {
    #[arg(long)]
    last_n: Option<i64>,
}

#[derive(Args, Debug, Clone)]
struct WatchArgs {
    #[arg(long, default_value_t = 3_000)]
    interval_ms: u64,
    /// Stop after this many polls; 0 runs until interrupted.
    #[arg(long, default_value_t = 0)]
    count: u64,
}

struct MonitorClient {
    http: Client,
    base: String,
}

impl MonitorClient {
    fn new(base: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn call(&self, method: Method, path: &str) -> Result<Value> {
        let url = format!("{}{path}", self.base);
        tracing::debug!(%method, %url, "request");
        let resp = self
            .http
            .request(method, &url)
            .send()
            .await
            .with_context(|| format!("request {url}"))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("decode response from {url}"))?;
        if !status.is_success() {
            return Err(anyhow!("{status}: {}", error_detail(&body)));
        }
        Ok(body)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.call(Method::GET, path).await
    }
}

fn error_detail(body: &Value) -> String {
    body.get("detail")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn window_path(kind: &str, args: &WindowArgs) -> String {
    match args.last_n {
        Some(n) => format!("/api/training/{kind}?last_n={n}"),
        None => format!("/api/training/{kind}"),
    }
}

fn summary_line(summary: &Value) -> String {
    format!(
        "{} mode={} point={} epoch={} step={} loss={} val_loss={} gpu={}% completed={}",
        Utc::now().format("%H:%M:%S"),
        summary["training_mode"].as_str().unwrap_or("?"),
        summary["data_point"].as_str().unwrap_or("?"),
        summary["current_epoch"],
        summary["current_step"],
        summary["current_train_loss"],
        summary["current_val_loss"],
        summary["gpu_utilization"],
        summary["is_completed"],
    )
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt().with_env_filter(level).try_init();
    let client = MonitorClient::new(&cli.base_url, Duration::from_millis(cli.timeout_ms.max(100)))?;

    match cli.command {
        Commands::Health => print_json(&client.get("/").await?),
        Commands::Mode(args) => match args.command {
            None => print_json(&client.get("/api/training/mode").await?),
            Some(ModeCommand::Set { mode }) => print_json(
                &client
                    .call(Method::POST, &format!("/api/training/mode/{mode}"))
                    .await?,
            ),
        },
        Commands::Status { job_id } => {
            print_json(&client.get(&format!("/api/training/status/{job_id}")).await?)
        }
        Commands::Summary => print_json(&client.get("/api/training/summary").await?),
        Commands::Losses(args) => print_json(&client.get(&window_path("losses", &args)).await?),
        Commands::Resources(args) => {
            print_json(&client.get(&window_path("resources", &args)).await?)
        }
        Commands::Job { uid } => print_json(&client.get(&format!("/api/jobs/{uid}")).await?),
        Commands::Watch(args) => run_watch(&client, args).await,
    }
}

async fn run_watch(client: &MonitorClient, args: WatchArgs) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(100)));
    let mut polls = 0_u64;
    loop {
        ticker.tick().await;
        match client.get("/api/training/summary").await {
            Ok(summary) => {
                println!("{}", summary_line(&summary));
                if summary["is_completed"].as_bool().unwrap_or(false) && args.count == 0 {
                    println!("replay completed");
                    return Ok(());
                }
            }
            Err(err) => eprintln!("{} {err:#}", Utc::now().format("%H:%M:%S")),
        }
        polls += 1;
        if args.count > 0 && polls >= args.count {
            return Ok(());
        }
    }
}
