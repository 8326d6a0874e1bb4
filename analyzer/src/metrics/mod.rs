//! Metrics computed over benchmarks
//!
//! Two variants share the [`Metric`] trait:
//! - [`StaticMetric`]: computed at most once per benchmark identity, then
//!   served from its cache.
//! - [`UpdatableMetric`]: recomputed on every run, each result appended to a
//!   per-benchmark time series. `needs_update` advises callers when the
//!   newest value is older than the metric's update frequency.
//!
//! Metrics never catch their own failures; the processor decides how a
//! failure is recorded.

pub mod builtin;
pub mod history;
pub mod registry;
pub mod static_metric;
pub mod updatable;

pub use builtin::{
    AvgTextLengthMetric, CitationCountMetric, DownloadCountMetric, NumClassesMetric,
    NumHfDownloadsMetric, NumHfLikesMetric, NumSamplesMetric,
};
pub use history::{HistoricalValues, HistoryEntry, HistorySnapshot};
pub use registry::{MetricInfo, MetricRegistry};
pub use static_metric::{StaticCompute, StaticMetric};
pub use updatable::{CurrentCompute, UpdatableMetric, DEFAULT_UPDATE_FREQUENCY_DAYS};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::benchmark::{Benchmark, BenchmarkError};

/// Result type alias for metric operations
pub type MetricResult<T> = Result<T, MetricError>;

/// Errors raised while running a metric
#[derive(Error, Debug)]
pub enum MetricError {
    /// The benchmark's current data cannot support this metric
    #[error("Metric '{metric}' cannot be computed for '{benchmark}': {reason}")]
    Computation {
        metric: String,
        benchmark: String,
        reason: String,
    },

    /// A column the metric reads is absent from the table
    #[error("Metric '{metric}' requires column '{column}'")]
    MissingColumn { metric: String, column: String },

    /// A benchmark hook failed while the metric was reading it
    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),

    #[error("Metric state lock poisoned")]
    LockPoisoned,
}

impl MetricError {
    pub fn computation(
        metric: impl Into<String>,
        benchmark: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Computation {
            metric: metric.into(),
            benchmark: benchmark.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(metric: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            metric: metric.into(),
            column: column.into(),
        }
    }

    /// Programming-contract violations are reported loudly instead of being
    /// treated as an ordinary missing value.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::Benchmark(inner) => inner.is_contract_violation(),
            Self::LockPoisoned => true,
            Self::Computation { .. } | Self::MissingColumn { .. } => false,
        }
    }
}

/// Which variant a metric is; decides its result-column prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Static,
    Updatable,
}

impl MetricKind {
    pub fn column_prefix(&self) -> &'static str {
        match self {
            MetricKind::Static => "static",
            MetricKind::Updatable => "dynamic",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Static => f.write_str("static"),
            MetricKind::Updatable => f.write_str("updatable"),
        }
    }
}

/// A named computation producing a numeric score for a benchmark
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn kind(&self) -> MetricKind;

    fn run(&self, benchmark: &dyn Benchmark) -> MetricResult<f64>;

    /// Result-table column holding this metric's score
    fn column(&self) -> String {
        format!("{}_{}", self.kind().column_prefix(), self.name())
    }
}
