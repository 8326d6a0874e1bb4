//! In-memory benchmark used by the demo and by CSV processing without a card source

use tracing::debug;

use super::{
    Benchmark, BenchmarkCore, BenchmarkError, BenchmarkMeta, BenchmarkResult, RawData, Table,
};

/// Benchmark whose "external source" is a payload staged in memory.
///
/// `refresh` downloads the staged payload (a JSON array of records),
/// processes it, and replaces the table. With nothing staged the source is
/// unavailable.
#[derive(Debug)]
pub struct ExampleBenchmark {
    core: BenchmarkCore,
    citations: u64,
    staged: Option<RawData>,
}

impl ExampleBenchmark {
    pub const KIND: &'static str = "ExampleBenchmark";

    pub fn new(meta: BenchmarkMeta) -> Self {
        Self {
            core: BenchmarkCore::new(meta),
            citations: 0,
            staged: None,
        }
    }

    pub fn with_data(mut self, table: Table) -> Self {
        self.core.set_data(table);
        self
    }

    pub fn with_citations(mut self, citations: u64) -> Self {
        self.citations = citations;
        self
    }

    /// Stage the payload the next `refresh` will pick up
    pub fn stage(&mut self, raw: RawData) {
        self.staged = Some(raw);
    }

    pub fn set_citations(&mut self, citations: u64) {
        self.citations = citations;
    }
}

impl Benchmark for ExampleBenchmark {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn core(&self) -> &BenchmarkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BenchmarkCore {
        &mut self.core
    }

    fn refresh(&mut self) -> BenchmarkResult<()> {
        let raw = self.download()?.ok_or_else(|| {
            BenchmarkError::source_unavailable(
                self.core.meta().dataset_url.as_deref().unwrap_or("staged payload"),
                "nothing staged",
            )
        })?;
        let table = self.process(&raw)?;
        debug!(benchmark = %self.name(), rows = table.height(), "Refreshed example benchmark");
        self.core.set_data(table);
        Ok(())
    }

    fn process(&self, raw: &RawData) -> BenchmarkResult<Table> {
        Table::from_json(raw)
    }

    fn get_citations(&self) -> BenchmarkResult<u64> {
        Ok(self.citations)
    }

    fn download(&self) -> BenchmarkResult<Option<RawData>> {
        Ok(self.staged.clone())
    }
}
