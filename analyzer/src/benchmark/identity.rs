//! Benchmark identity keys used to index metric caches and histories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Benchmark;

/// Unique token minted for every benchmark instance at construction.
///
/// Never cloned from another instance, so two benchmarks built from the same
/// record still get different tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Key under which a metric stores per-benchmark state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkKey(String);

impl BenchmarkKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BenchmarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a metric derives a [`BenchmarkKey`] from a benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// `<kind>_<instance token>`: every instance is distinct, even with identical data.
    #[default]
    Instance,
    /// `<kind>:<ds_id or name>`: instances describing the same dataset share state.
    Declared,
}

impl IdentityPolicy {
    pub fn key_for(&self, benchmark: &dyn Benchmark) -> BenchmarkKey {
        match self {
            IdentityPolicy::Instance => {
                BenchmarkKey(format!("{}_{}", benchmark.kind(), benchmark.instance_id()))
            }
            IdentityPolicy::Declared => BenchmarkKey(format!(
                "{}:{}",
                benchmark.kind(),
                benchmark.meta().declared_id()
            )),
        }
    }
}

impl fmt::Display for IdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityPolicy::Instance => f.write_str("instance"),
            IdentityPolicy::Declared => f.write_str("declared"),
        }
    }
}

impl FromStr for IdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instance" => Ok(IdentityPolicy::Instance),
            "declared" => Ok(IdentityPolicy::Declared),
            other => Err(format!(
                "unknown identity policy '{other}' (expected 'instance' or 'declared')"
            )),
        }
    }
}
