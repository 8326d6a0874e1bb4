//! Recurring metrics that accumulate a per-benchmark history

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use tracing::debug;

use super::history::{HistoricalValues, HistoryEntry, HistorySnapshot, HistoryStore};
use super::{Metric, MetricKind, MetricResult};
use crate::benchmark::{Benchmark, BenchmarkKey, IdentityPolicy};
use crate::clock::{SharedClock, SystemClock, Timestamp};

/// Days after which an updatable metric's newest value is considered stale
pub const DEFAULT_UPDATE_FREQUENCY_DAYS: u32 = 7;

/// The computation bound to an [`UpdatableMetric`]
pub trait CurrentCompute: Send + Sync {
    fn compute_current(&self, benchmark: &dyn Benchmark) -> MetricResult<f64>;
}

impl<F> CurrentCompute for F
where
    F: Fn(&dyn Benchmark) -> MetricResult<f64> + Send + Sync,
{
    fn compute_current(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        self(benchmark)
    }
}

/// A metric recomputed on every run.
///
/// Each successful `run` appends exactly one `(timestamp, score)` entry to
/// the benchmark's series. `update_frequency_days` only feeds
/// [`needs_update`](Self::needs_update); `run` is never gated.
pub struct UpdatableMetric {
    name: String,
    description: String,
    update_frequency_days: u32,
    identity: IdentityPolicy,
    compute: Box<dyn CurrentCompute>,
    clock: SharedClock,
    history: HistoryStore,
    last_issued: Mutex<Option<NaiveDateTime>>,
}

impl UpdatableMetric {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        compute: impl CurrentCompute + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            update_frequency_days: DEFAULT_UPDATE_FREQUENCY_DAYS,
            identity: IdentityPolicy::default(),
            compute: Box::new(compute),
            clock: Arc::new(SystemClock),
            history: HistoryStore::default(),
            last_issued: Mutex::new(None),
        }
    }

    /// Build from a closure
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Benchmark) -> MetricResult<f64> + Send + Sync + 'static,
    {
        Self::new(name, description, f)
    }

    pub fn with_update_frequency_days(mut self, days: u32) -> Self {
        self.update_frequency_days = days;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_identity(mut self, identity: IdentityPolicy) -> Self {
        self.identity = identity;
        self
    }

    pub fn update_frequency_days(&self) -> u32 {
        self.update_frequency_days
    }

    pub fn identity(&self) -> IdentityPolicy {
        self.identity
    }

    pub fn key_for(&self, benchmark: &dyn Benchmark) -> BenchmarkKey {
        self.identity.key_for(benchmark)
    }

    /// Evaluate the current value without recording it
    pub fn compute_current(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        self.compute.compute_current(benchmark)
    }

    /// Copy of the benchmark's series in insertion order; empty if never run
    pub fn get_historical_values(
        &self,
        benchmark: &dyn Benchmark,
    ) -> MetricResult<HistoricalValues> {
        self.history.get(&self.key_for(benchmark))
    }

    pub fn history_len(&self, benchmark: &dyn Benchmark) -> MetricResult<usize> {
        Ok(self.get_historical_values(benchmark)?.len())
    }

    /// True if the benchmark has no history, or its newest timestamp (by
    /// value) is at least `update_frequency_days` whole days old.
    pub fn needs_update(&self, benchmark: &dyn Benchmark) -> MetricResult<bool> {
        let history = self.get_historical_values(benchmark)?;
        let Some(latest) = history.latest() else {
            return Ok(true);
        };
        let age_days = latest.timestamp.days_before(self.clock.now());
        Ok(age_days >= i64::from(self.update_frequency_days))
    }

    /// Append externally recorded entries, in the given order.
    ///
    /// Returns the series length afterwards.
    pub fn import_history(
        &self,
        benchmark: &dyn Benchmark,
        entries: impl IntoIterator<Item = HistoryEntry>,
    ) -> MetricResult<usize> {
        let key = self.key_for(benchmark);
        let len = self.history.extend(&key, entries)?;
        debug!(metric = %self.name, benchmark = %key, count = len, "Imported history");
        Ok(len)
    }

    /// Serializable copy of every series this metric holds
    pub fn snapshot(&self) -> MetricResult<HistorySnapshot> {
        Ok(HistorySnapshot {
            metric: self.name.clone(),
            update_frequency_days: self.update_frequency_days,
            series: self.history.snapshot()?,
        })
    }

    /// Wall-clock time, clamped so it never precedes a timestamp this
    /// metric already issued.
    fn next_timestamp(&self) -> Timestamp {
        let now = self.clock.now();
        let mut last = match self.last_issued.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let issued = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(issued);
        Timestamp::new(issued)
    }
}

impl fmt::Debug for UpdatableMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatableMetric")
            .field("name", &self.name)
            .field("update_frequency_days", &self.update_frequency_days)
            .field("identity", &self.identity)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Metric for UpdatableMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Updatable
    }

    fn run(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        let key = self.key_for(benchmark);
        let score = self.compute_current(benchmark)?;
        let (entry, count) = self
            .history
            .append_with(&key, || HistoryEntry::new(self.next_timestamp(), score))?;
        debug!(
            metric = %self.name,
            benchmark = %key,
            timestamp = %entry.timestamp,
            score,
            count,
            "Recorded metric value"
        );
        Ok(score)
    }
}
