//! Construction of benchmarks from input records

use std::sync::Arc;

use crate::records::BenchmarkRecord;

use super::source::SharedCardSource;
use super::{Benchmark, BenchmarkResult, CardBenchmark, ExampleBenchmark, Row, Table};

/// Builds one benchmark per input record
pub trait BenchmarkFactory: Send + Sync {
    /// Kind of benchmark this factory produces, for logging
    fn kind(&self) -> &'static str;

    fn create(&self, record: &BenchmarkRecord) -> BenchmarkResult<Box<dyn Benchmark>>;
}

/// Produces [`ExampleBenchmark`]s seeded with a one-row sample table
/// derived from the record name.
///
/// A `citations` column in the record, if numeric, becomes the citation count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleFactory;

impl ExampleFactory {
    pub fn sample_table(name: &str) -> BenchmarkResult<Table> {
        Table::from_records(vec![Row::new()
            .with("text", format!("Sample text for {name}"))
            .with("label", 0_i64)
            .with("length", name.chars().count())])
    }
}

impl BenchmarkFactory for ExampleFactory {
    fn kind(&self) -> &'static str {
        ExampleBenchmark::KIND
    }

    fn create(&self, record: &BenchmarkRecord) -> BenchmarkResult<Box<dyn Benchmark>> {
        let citations = record
            .get("citations")
            .and_then(|c| c.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let benchmark = ExampleBenchmark::new(record.meta())
            .with_data(Self::sample_table(record.name())?)
            .with_citations(citations);
        Ok(Box::new(benchmark))
    }
}

/// Produces [`CardBenchmark`]s sharing one card source
#[derive(Debug, Clone)]
pub struct CardFactory {
    source: SharedCardSource,
}

impl CardFactory {
    pub fn new(source: SharedCardSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &SharedCardSource {
        &self.source
    }
}

impl BenchmarkFactory for CardFactory {
    fn kind(&self) -> &'static str {
        CardBenchmark::KIND
    }

    fn create(&self, record: &BenchmarkRecord) -> BenchmarkResult<Box<dyn Benchmark>> {
        Ok(Box::new(CardBenchmark::new(
            record.meta(),
            Arc::clone(&self.source),
        )))
    }
}
