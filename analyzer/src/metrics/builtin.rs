//! Built-in metrics
//!
//! Each type here is the computation for one metric; `build()` wraps it in
//! the matching [`StaticMetric`] or [`UpdatableMetric`] with its canonical
//! name and description.

use super::static_metric::{StaticCompute, StaticMetric};
use super::updatable::{CurrentCompute, UpdatableMetric};
use super::{MetricError, MetricResult};
use crate::benchmark::Benchmark;

/// Row count of the processed table (0.0 when there is no table)
#[derive(Debug, Clone, Copy, Default)]
pub struct NumSamplesMetric;

impl NumSamplesMetric {
    pub const NAME: &'static str = "num_samples";
    pub const DESCRIPTION: &'static str = "Number of samples in the benchmark";

    pub fn build() -> StaticMetric {
        StaticMetric::new(Self::NAME, Self::DESCRIPTION, Self)
    }
}

impl StaticCompute for NumSamplesMetric {
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        Ok(benchmark.data().map_or(0.0, |table| table.height() as f64))
    }
}

/// Mean of the `length` column (0.0 when the table or column is absent)
#[derive(Debug, Clone, Copy, Default)]
pub struct AvgTextLengthMetric;

impl AvgTextLengthMetric {
    pub const NAME: &'static str = "avg_text_length";
    pub const DESCRIPTION: &'static str = "Average length of text samples";

    pub fn build() -> StaticMetric {
        StaticMetric::new(Self::NAME, Self::DESCRIPTION, Self)
    }
}

impl StaticCompute for AvgTextLengthMetric {
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        Ok(benchmark
            .data()
            .and_then(|table| table.mean("length"))
            .unwrap_or(0.0))
    }
}

/// Distinct values of the `label` column (0.0 when the table or column is absent)
#[derive(Debug, Clone, Copy, Default)]
pub struct NumClassesMetric;

impl NumClassesMetric {
    pub const NAME: &'static str = "num_classes";
    pub const DESCRIPTION: &'static str = "Number of unique classes in the benchmark";

    pub fn build() -> StaticMetric {
        StaticMetric::new(Self::NAME, Self::DESCRIPTION, Self)
    }
}

impl StaticCompute for NumClassesMetric {
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        Ok(benchmark
            .data()
            .and_then(|table| table.n_unique("label"))
            .map_or(0.0, |n| n as f64))
    }
}

/// Sum of a column; the table and the column are both required.
fn column_sum(metric: &str, column: &str, benchmark: &dyn Benchmark) -> MetricResult<f64> {
    let table = benchmark.data().ok_or_else(|| {
        MetricError::computation(metric, benchmark.name(), "benchmark has no data")
    })?;
    table
        .sum(column)
        .ok_or_else(|| MetricError::missing_column(metric, column))
}

/// Total Hugging Face downloads recorded in the dataset card
#[derive(Debug, Clone, Copy, Default)]
pub struct NumHfDownloadsMetric;

impl NumHfDownloadsMetric {
    pub const NAME: &'static str = "num_hf_downloads";
    pub const DESCRIPTION: &'static str = "Number of Hugging Face downloads";

    pub fn build() -> StaticMetric {
        StaticMetric::new(Self::NAME, Self::DESCRIPTION, Self)
    }
}

impl StaticCompute for NumHfDownloadsMetric {
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        column_sum(Self::NAME, "hf_downloads", benchmark)
    }
}

/// Total Hugging Face likes recorded in the dataset card
#[derive(Debug, Clone, Copy, Default)]
pub struct NumHfLikesMetric;

impl NumHfLikesMetric {
    pub const NAME: &'static str = "num_hf_likes";
    pub const DESCRIPTION: &'static str = "Number of Hugging Face likes";

    pub fn build() -> StaticMetric {
        StaticMetric::new(Self::NAME, Self::DESCRIPTION, Self)
    }
}

impl StaticCompute for NumHfLikesMetric {
    fn compute(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        column_sum(Self::NAME, "hf_likes", benchmark)
    }
}

/// Citation count of the benchmark's paper, refreshed monthly
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationCountMetric;

impl CitationCountMetric {
    pub const NAME: &'static str = "citation_count";
    pub const DESCRIPTION: &'static str = "Number of citations for the benchmark's paper";
    pub const UPDATE_FREQUENCY_DAYS: u32 = 30;

    pub fn build() -> UpdatableMetric {
        UpdatableMetric::new(Self::NAME, Self::DESCRIPTION, Self)
            .with_update_frequency_days(Self::UPDATE_FREQUENCY_DAYS)
    }
}

impl CurrentCompute for CitationCountMetric {
    fn compute_current(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        Ok(benchmark.get_citations()? as f64)
    }
}

/// Simulated download count, stable per benchmark name, in `100..=10000`
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadCountMetric;

impl DownloadCountMetric {
    pub const NAME: &'static str = "download_count";
    pub const DESCRIPTION: &'static str = "Number of downloads for the benchmark";
    pub const UPDATE_FREQUENCY_DAYS: u32 = 7;

    const MIN: u64 = 100;
    const MAX: u64 = 10_000;

    pub fn build() -> UpdatableMetric {
        UpdatableMetric::new(Self::NAME, Self::DESCRIPTION, Self)
            .with_update_frequency_days(Self::UPDATE_FREQUENCY_DAYS)
    }

    /// Seeded by the first eight bytes of the name's BLAKE3 hash
    pub fn simulated_count(name: &str) -> u64 {
        let hash = blake3::hash(name.as_bytes());
        let mut seed = [0_u8; 8];
        seed.copy_from_slice(&hash.as_bytes()[..8]);
        Self::MIN + u64::from_le_bytes(seed) % (Self::MAX - Self::MIN + 1)
    }
}

impl CurrentCompute for DownloadCountMetric {
    fn compute_current(&self, benchmark: &dyn Benchmark) -> MetricResult<f64> {
        Ok(Self::simulated_count(benchmark.name()) as f64)
    }
}
