use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use core_types::{LossSample, Mode, ResourceSample, SeriesKind};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;

/// Where recorded series come from. `Ok(None)` means the source for that
/// mode/kind does not exist; the store records it as an empty series.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn load_loss(&self, mode: Mode) -> Result<Option<Vec<LossSample>>>;
    async fn load_resource(&self, mode: Mode) -> Result<Option<Vec<ResourceSample>>>;

    fn describe(&self, mode: Mode, kind: SeriesKind) -> String;
}

/// Reads `<root>/<template>` where `{mode}` in the template is replaced by
/// the mode name. `.csv` files need a header row naming the sample fields;
/// `.jsonl` files carry one sample object per line.
#[derive(Debug, Clone)]
pub struct FileSeriesSource {
    root: PathBuf,
    loss_file: String,
    resource_file: String,
}

impl FileSeriesSource {
    pub fn new(
        root: impl Into<PathBuf>,
        loss_file: impl Into<String>,
        resource_file: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            loss_file: loss_file.into(),
            resource_file: resource_file.into(),
        }
    }

    pub fn path_for(&self, mode: Mode, kind: SeriesKind) -> PathBuf {
        let template = match kind {
            SeriesKind::Loss => &self.loss_file,
            SeriesKind::Resource => &self.resource_file,
        };
        self.root.join(template.replace("{mode}", mode.as_str()))
    }
}

#[async_trait]
impl SeriesSource for FileSeriesSource {
    async fn load_loss(&self, mode: Mode) -> Result<Option<Vec<LossSample>>> {
        read_samples(&self.path_for(mode, SeriesKind::Loss)).await
    }

    async fn load_resource(&self, mode: Mode) -> Result<Option<Vec<ResourceSample>>> {
        read_samples(&self.path_for(mode, SeriesKind::Resource)).await
    }

    fn describe(&self, mode: Mode, kind: SeriesKind) -> String {
        self.path_for(mode, kind).display().to_string()
    }
}

async fn read_samples<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read series file {}", path.display()))
        }
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let samples = match ext.as_str() {
        "csv" => parse_csv(&raw),
        "jsonl" | "ndjson" => parse_jsonl(&raw),
        other => Err(anyhow!("unsupported series format '{other}'")),
    }
    .with_context(|| format!("decode series file {}", path.display()))?;
    Ok(Some(samples))
}

pub fn parse_csv<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let mut out = Vec::new();
    for (row, record) in reader.deserialize::<T>().enumerate() {
        out.push(record.with_context(|| format!("csv row {}", row + 1))?);
    }
    Ok(out)
}

pub fn parse_jsonl<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| serde_json::from_str(line).with_context(|| format!("jsonl line {}", n + 1)))
        .collect()
}

#[derive(Debug, Clone, Default)]
struct StaticEntry {
    loss: Option<Vec<LossSample>>,
    resource: Option<Vec<ResourceSample>>,
}

/// In-memory series, injected directly. Entries can be replaced between
/// loads, and an artificial delay makes slow sources reproducible.
#[derive(Debug, Default)]
pub struct StaticSeriesSource {
    entries: RwLock<HashMap<Mode, StaticEntry>>,
    delay: Option<Duration>,
}

impl StaticSeriesSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic, plausible-looking curves for both modes.
    pub fn synthetic(manual_len: usize, automated_len: usize) -> Self {
        let source = Self::new();
        source.put(
            Mode::Manual,
            Some(synthetic_loss(manual_len, 1.0)),
            Some(synthetic_resource(manual_len, 0.0)),
        );
        source.put(
            Mode::Automated,
            Some(synthetic_loss(automated_len, 1.6)),
            Some(synthetic_resource(automated_len, 0.7)),
        );
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn put(
        &self,
        mode: Mode,
        loss: Option<Vec<LossSample>>,
        resource: Option<Vec<ResourceSample>>,
    ) {
        self.entries
            .write()
            .insert(mode, StaticEntry { loss, resource });
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SeriesSource for StaticSeriesSource {
    async fn load_loss(&self, mode: Mode) -> Result<Option<Vec<LossSample>>> {
        self.pause().await;
        Ok(self.entries.read().get(&mode).and_then(|e| e.loss.clone()))
    }

    async fn load_resource(&self, mode: Mode) -> Result<Option<Vec<ResourceSample>>> {
        self.pause().await;
        Ok(self.entries.read().get(&mode).and_then(|e| e.resource.clone()))
    }

    fn describe(&self, mode: Mode, kind: SeriesKind) -> String {
        format!("static:{mode}/{kind}")
    }
}

pub fn synthetic_loss(len: usize, speed: f64) -> Vec<LossSample> {
    let span = (len.max(1)) as f64;
    (0..len)
        .map(|i| {
            let t = i as f64 / span;
            let train = 0.35 + 2.1 * (-3.0 * speed * t).exp() + 0.02 * (i as f64 * 0.9).sin();
            LossSample {
                iteration: i as u64,
                epoch: ((t * 3.0).floor() as u32).min(2) + 1,
                step: i as u64 + 1,
                train_loss: round4(train),
                validation_loss: round4(train + 0.06 + 0.015 * (i as f64 * 0.4).cos()),
                learning_rate: 2e-5 * (1.0 - 0.9 * t),
                batch_size: 8,
            }
        })
        .collect()
}

pub fn synthetic_resource(len: usize, phase: f64) -> Vec<ResourceSample> {
    (0..len)
        .map(|i| {
            let x = i as f64 * 0.35 + phase;
            ResourceSample {
                iteration: i as u64,
                cpu_percent: round4(42.0 + 8.0 * x.sin()),
                ram_used_gb: round4(21.5 + 1.5 * (x * 0.5).cos()),
                ram_total_gb: 64.0,
                gpu_percent: round4(88.0 + 6.0 * (x * 1.3).sin()),
                vram_used_gb: round4(17.2 + 0.8 * x.cos()),
                vram_total_gb: 24.0,
                disk_used_gb: round4(412.0 + 0.05 * i as f64),
                disk_total_gb: 1000.0,
                gpu_temp: 71 + (4.0 * x.sin()).round() as i32,
                cpu_temp: 58 + (3.0 * x.cos()).round() as i32,
                network_in_mbps: round4(12.0 + 3.0 * (x * 0.7).sin()),
                network_out_mbps: round4(4.0 + 1.0 * (x * 0.9).cos()),
            }
        })
        .collect()
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOSS_CSV: &str = "\
iteration,epoch,step,train_loss,validation_loss,learning_rate,batch_size
0,1,1,2.4512,2.5103,0.00002,8
1,1,2,2.3011,2.4020,0.0000198,8
2,1,3,2.1877,2.3005,0.0000196,8
";

    #[test]
    fn csv_rows_decode_in_order() {
        let rows: Vec<LossSample> = parse_csv(LOSS_CSV).expect("parse");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].iteration, 0);
        assert_eq!(rows[2].step, 3);
        assert_eq!(rows[1].batch_size, 8);
    }

    #[test]
    fn csv_bad_row_reports_position() {
        let raw = "iteration,epoch,step,train_loss,validation_loss,learning_rate,batch_size\n0,1,1,abc,2.5,0.1,8\n";
        let err = parse_csv::<LossSample>(raw).expect_err("bad float");
        assert!(format!("{err:#}").contains("csv row 1"));
    }

    #[test]
    fn jsonl_skips_blank_lines() {
        let sample = synthetic_loss(2, 1.0);
        let raw = format!(
            "{}\n\n{}\n",
            serde_json::to_string(&sample[0]).expect("encode"),
            serde_json::to_string(&sample[1]).expect("encode"),
        );
        let rows: Vec<LossSample> = parse_jsonl(&raw).expect("parse");
        assert_eq!(rows, sample);
    }

    #[tokio::test]
    async fn file_source_substitutes_mode_and_reports_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("training_metrics_manual.csv"), LOSS_CSV).expect("write");
        let source = FileSeriesSource::new(
            dir.path(),
            "training_metrics_{mode}.csv",
            "resource_metrics_{mode}.jsonl",
        );

        let manual = source.load_loss(Mode::Manual).await.expect("load");
        assert_eq!(manual.map(|v| v.len()), Some(3));
        let automated = source.load_loss(Mode::Automated).await.expect("load");
        assert!(automated.is_none());
        let resources = source.load_resource(Mode::Manual).await.expect("load");
        assert!(resources.is_none());
        assert!(source
            .describe(Mode::Automated, SeriesKind::Resource)
            .ends_with("resource_metrics_automated.jsonl"));
    }

    #[tokio::test]
    async fn file_source_rejects_unknown_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("loss_manual.parquet"), "x").expect("write");
        let source = FileSeriesSource::new(dir.path(), "loss_{mode}.parquet", "res_{mode}.csv");
        assert!(source.load_loss(Mode::Manual).await.is_err());
    }

    #[test]
    fn synthetic_curves_have_requested_length() {
        let loss = synthetic_loss(30, 1.0);
        assert_eq!(loss.len(), 30);
        assert!(loss[29].train_loss < loss[0].train_loss);
        assert!(loss.iter().all(|s| (1..=3).contains(&s.epoch)));
        assert_eq!(synthetic_resource(7, 0.0).len(), 7);
    }
}
