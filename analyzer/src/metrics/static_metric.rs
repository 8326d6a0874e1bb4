//! One-shot metrics memoized per benchmark identity

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use super::{Metric, MetricError, MetricKind, MetricResult};
use crate::benchmark::{Benchmark, BenchmarkKey, IdentityPolicy};

/// The computation bound to a [`StaticMetric`]
pub trait StaticCompute: Send + Sync {
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64>;
}

impl<F> StaticCompute for F
where
    F: Fn(&dyn Benchmark) -> MetricResult<f64> + Send + Sync,
{
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        self(benchmark)
    }
}

type Slot = Arc<Mutex<Option<f64>>>;

enum CacheLookup {
    Hit(f64),
    Computed(f64),
}

/// Identity key → score.
///
/// Each key has its own slot lock, held across the computation, so
/// concurrent runs for one key compute once while other keys proceed.
#[derive(Default)]
struct ScoreCache {
    slots: RwLock<HashMap<BenchmarkKey, Slot>>,
}

impl ScoreCache {
    fn slot(&self, key: &BenchmarkKey) -> MetricResult<Slot> {
        {
            let slots = self.slots.read().map_err(|_| MetricError::LockPoisoned)?;
            if let Some(slot) = slots.get(key) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut slots = self.slots.write().map_err(|_| MetricError::LockPoisoned)?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// A failed computation leaves the slot empty, so the next run retries.
    fn get_or_compute(
        &self,
        key: &BenchmarkKey,
        compute: impl FnOnce() -> MetricResult<f64>,
    ) -> MetricResult<CacheLookup> {
        let slot = self.slot(key)?;
        let mut guard = slot.lock().map_err(|_| MetricError::LockPoisoned)?;
        if let Some(score) = *guard {
            return Ok(CacheLookup::Hit(score));
        }
        let score = compute()?;
        *guard = Some(score);
        Ok(CacheLookup::Computed(score))
    }

    fn get(&self, key: &BenchmarkKey) -> MetricResult<Option<f64>> {
        let slot = {
            let slots = self.slots.read().map_err(|_| MetricError::LockPoisoned)?;
            match slots.get(key) {
                Some(slot) => Arc::clone(slot),
                None => return Ok(None),
            }
        };
        let guard = slot.lock().map_err(|_| MetricError::LockPoisoned)?;
        Ok(*guard)
    }

    fn len(&self) -> MetricResult<usize> {
        let slots = self.slots.read().map_err(|_| MetricError::LockPoisoned)?;
        let mut filled = 0;
        for slot in slots.values() {
            if slot.lock().map_err(|_| MetricError::LockPoisoned)?.is_some() {
                filled += 1;
            }
        }
        Ok(filled)
    }
}

/// A metric computed at most once per benchmark identity.
///
/// Once a score is cached for a key, `run` returns it unconditionally, even
/// if the benchmark's data has since been refreshed.
pub struct StaticMetric {
    name: String,
    description: String,
    identity: IdentityPolicy,
    compute: Box<dyn StaticCompute>,
    cache: ScoreCache,
}

impl StaticMetric {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        compute: impl StaticCompute + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            identity: IdentityPolicy::default(),
            compute: Box::new(compute),
            cache: ScoreCache::default(),
        }
    }

    /// Build from a closure
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Benchmark) -> MetricResult<f64> + Send + Sync + 'static,
    {
        Self::new(name, description, f)
    }

    pub fn with_identity(mut self, identity: IdentityPolicy) -> Self {
        self.identity = identity;
        self
    }

    pub fn identity(&self) -> IdentityPolicy {
        self.identity
    }

    pub fn key_for(&self, benchmark: &dyn Benchmark) -> BenchmarkKey {
        self.identity.key_for(benchmark)
    }

    /// Evaluate against the benchmark's current data, bypassing the cache
    pub fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        self.compute.compute(benchmark)
    }

    /// Cached score for a benchmark, if one has been computed
    pub fn cached(&self, benchmark: &dyn Benchmark) -> MetricResult<Option<f64>> {
        self.cache.get(&self.key_for(benchmark))
    }

    /// Number of benchmarks with a cached score
    pub fn cache_len(&self) -> MetricResult<usize> {
        self.cache.len()
    }
}

impl fmt::Debug for StaticMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMetric")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Metric for StaticMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> MetricKind {
        MetricKind::Static
    }

    fn run(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        let key = self.key_for(benchmark);
        match self
            .cache
            .get_or_compute(&key, || self.compute.compute(benchmark))?
        {
            CacheLookup::Hit(score) => {
                debug!(metric = %self.name, benchmark = %key, score, "Static metric cache hit");
                Ok(score)
            }
            CacheLookup::Computed(score) => {
                debug!(metric = %self.name, benchmark = %key, score, "Computed static metric");
                Ok(score)
            }
        }
    }
}
