use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Wall-clock source. Injected so replay arithmetic can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.write();
        *now += step;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// What happens once elapsed time runs past the last recorded sample.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Hold on the last sample and report completion.
    #[default]
    Clamp,
    /// Wrap around to the first sample. Never completes, and a new pass is
    /// indistinguishable from the first except through `ClockReading::pass`.
    Loop,
}

impl fmt::Display for ReplayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayPolicy::Clamp => f.write_str("clamp"),
            ReplayPolicy::Loop => f.write_str("loop"),
        }
    }
}

impl FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" | "clamping" => Ok(ReplayPolicy::Clamp),
            "loop" | "looping" => Ok(ReplayPolicy::Loop),
            other => Err(format!("unknown replay policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockReading {
    pub index: usize,
    pub raw_index: u64,
    pub completed: bool,
    /// Completed passes through the series (loop policy only; always 0 when clamping).
    pub pass: u64,
    pub elapsed_ms: i64,
}

/// Maps elapsed wall-clock time to a position in a series of known length.
#[derive(Debug, Clone, Copy)]
pub struct ReplayClock {
    sampling_interval_ms: u64,
    policy: ReplayPolicy,
}

impl ReplayClock {
    pub fn new(sampling_interval: Duration, policy: ReplayPolicy) -> Self {
        Self {
            sampling_interval_ms: (sampling_interval.as_millis() as u64).max(1),
            policy,
        }
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn elapsed_ms(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (now - started_at).num_milliseconds().max(0)
    }

    pub fn raw_index(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        Self::elapsed_ms(started_at, now) as u64 / self.sampling_interval_ms
    }

    /// Position for a series of `length` samples. A zero-length series reads
    /// as index 0; callers must treat it as unavailable before indexing.
    pub fn reading(
        &self,
        length: usize,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ClockReading {
        let elapsed_ms = Self::elapsed_ms(started_at, now);
        let raw_index = elapsed_ms as u64 / self.sampling_interval_ms;
        if length == 0 {
            return ClockReading {
                index: 0,
                raw_index,
                completed: false,
                pass: 0,
                elapsed_ms,
            };
        }
        let len = length as u64;
        match self.policy {
            ReplayPolicy::Clamp => ClockReading {
                index: raw_index.min(len - 1) as usize,
                raw_index,
                completed: raw_index >= len - 1,
                pass: 0,
                elapsed_ms,
            },
            ReplayPolicy::Loop => ClockReading {
                index: (raw_index % len) as usize,
                raw_index,
                completed: false,
                pass: raw_index / len,
                elapsed_ms,
            },
        }
    }

    pub fn current_index(
        &self,
        length: usize,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> usize {
        self.reading(length, started_at, now).index
    }
}
