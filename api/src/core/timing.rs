//! Named phase timings for one request.
//!
//! A phase is either one elapsed value or a compound of named parts whose
//! `total` is their sum (e.g. `inference_time` over `inference_<n>` and
//! `verification_<n>`). Values are seconds.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Timing {
    Elapsed(f64),
    Compound {
        total: f64,
        #[serde(flatten)]
        parts: BTreeMap<String, f64>,
    },
}

impl Timing {
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Elapsed(s) => *s,
            Self::Compound { total, .. } => *total,
        }
    }
}

pub type Timings = BTreeMap<String, Timing>;

#[derive(Debug)]
pub struct TimingManager {
    started: Instant,
    timings: Timings,
}

impl Default for TimingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingManager {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            timings: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, key: &str, elapsed: Duration) {
        self.record_secs(key, elapsed.as_secs_f64());
    }

    pub fn record_secs(&mut self, key: &str, secs: f64) {
        self.timings.insert(key.to_string(), Timing::Elapsed(secs));
    }

    /// Adds `part` under the compound phase `key` and updates its total.
    /// A plain value already stored under `key` is replaced.
    pub fn record_part(&mut self, key: &str, part: &str, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let entry = self
            .timings
            .entry(key.to_string())
            .or_insert_with(|| Timing::Compound {
                total: 0.0,
                parts: BTreeMap::new(),
            });
        if let Timing::Elapsed(_) = entry {
            *entry = Timing::Compound {
                total: 0.0,
                parts: BTreeMap::new(),
            };
        }
        if let Timing::Compound { total, parts } = entry {
            parts.insert(part.to_string(), secs);
            *total = parts.values().sum();
        }
    }

    /// Awaits `fut` and records its wall time under `key`.
    pub async fn time<F: Future>(&mut self, key: &str, fut: F) -> F::Output {
        let start = Instant::now();
        let out = fut.await;
        self.record(key, start.elapsed());
        out
    }

    /// Awaits `fut` and records it as `part` of the compound phase `key`.
    pub async fn time_part<F: Future>(&mut self, key: &str, part: &str, fut: F) -> F::Output {
        let start = Instant::now();
        let out = fut.await;
        self.record_part(key, part, start.elapsed());
        out
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.timings.get(key).map(Timing::seconds)
    }

    pub fn extend(&mut self, other: &Timings) {
        for (k, v) in other {
            self.timings.insert(k.clone(), v.clone());
        }
    }

    pub fn snapshot(&self) -> Timings {
        self.timings.clone()
    }

    /// Snapshot with `total` set to the time since the clock started.
    pub fn finalize(&mut self) -> Timings {
        let total = self.started.elapsed().as_secs_f64();
        self.timings.insert("total".into(), Timing::Elapsed(total));
        self.timings.clone()
    }
}
