//! Benchmark entities
//!
//! A benchmark is a dataset under observation: identity, descriptive
//! metadata, and a lazily populated [`Table`] of processed data. Concrete
//! benchmarks decide how data is fetched (`refresh`) and shaped (`process`);
//! metrics only ever read the current table and metadata.
//!
//! Types:
//! - [`Benchmark`]: the trait every benchmark kind implements
//! - [`BenchmarkCore`]: identity + metadata + table, embedded by implementors
//! - [`ExampleBenchmark`]: in-memory benchmark with a staged payload
//! - [`CardBenchmark`]: dataset-card backed benchmark
//! - [`BenchmarkFactory`]: builds benchmarks from input records

pub mod card;
pub mod example;
pub mod factory;
pub mod identity;
pub mod source;
pub mod table;

pub use card::CardBenchmark;
pub use example::ExampleBenchmark;
pub use factory::{BenchmarkFactory, CardFactory, ExampleFactory};
pub use identity::{BenchmarkKey, IdentityPolicy, InstanceId};
pub use source::{CardSource, MemoryCardSource, YamlCardSource};
pub use table::{Row, Scalar, Table};

use polars::error::PolarsError;
use thiserror::Error;

/// Raw payload handed from `download` to `process`
pub type RawData = serde_json::Value;

/// Result type alias for benchmark operations
pub type BenchmarkResult<T> = Result<T, BenchmarkError>;

/// Errors raised by benchmark operations
#[derive(Error, Debug)]
pub enum BenchmarkError {
    /// The external data source could not be read
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The benchmark kind does not provide this operation
    #[error("{kind} does not implement {operation}")]
    Unimplemented {
        kind: &'static str,
        operation: &'static str,
    },

    /// A table was built with inconsistent shape
    #[error("Invalid table: {reason}")]
    InvalidTable { reason: String },

    /// Raw data could not be transformed into a table
    #[error("Processing failed: {reason}")]
    Process { reason: String },
}

impl From<PolarsError> for BenchmarkError {
    fn from(err: PolarsError) -> Self {
        Self::InvalidTable {
            reason: err.to_string(),
        }
    }
}

impl BenchmarkError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn unimplemented(kind: &'static str, operation: &'static str) -> Self {
        Self::Unimplemented { kind, operation }
    }

    pub fn process(reason: impl Into<String>) -> Self {
        Self::Process {
            reason: reason.into(),
        }
    }

    /// Whether this error signals a programming mistake rather than bad data
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}

/// Descriptive metadata supplied when a benchmark is constructed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchmarkMeta {
    pub name: String,
    pub paper_url: Option<String>,
    pub dataset_url: Option<String>,
    /// Benchmark-specific dataset identifier, e.g. a Hugging Face `datasetId`
    pub ds_id: Option<String>,
}

impl BenchmarkMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_paper_url(mut self, url: impl Into<String>) -> Self {
        self.paper_url = Some(url.into());
        self
    }

    pub fn with_dataset_url(mut self, url: impl Into<String>) -> Self {
        self.dataset_url = Some(url.into());
        self
    }

    pub fn with_ds_id(mut self, ds_id: impl Into<String>) -> Self {
        self.ds_id = Some(ds_id.into());
        self
    }

    /// Caller-declared identity: `ds_id` when present, else `name`
    pub fn declared_id(&self) -> &str {
        self.ds_id.as_deref().unwrap_or(&self.name)
    }
}

/// State shared by every benchmark kind.
///
/// Not `Clone`: each core owns a distinct [`InstanceId`].
#[derive(Debug)]
pub struct BenchmarkCore {
    meta: BenchmarkMeta,
    instance: InstanceId,
    data: Option<Table>,
}

impl BenchmarkCore {
    pub fn new(meta: BenchmarkMeta) -> Self {
        Self {
            meta,
            instance: InstanceId::new(),
            data: None,
        }
    }

    pub fn with_data(mut self, table: Table) -> Self {
        self.data = Some(table);
        self
    }

    pub fn meta(&self) -> &BenchmarkMeta {
        &self.meta
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    pub fn data(&self) -> Option<&Table> {
        self.data.as_ref()
    }

    /// Replace the table wholesale
    pub fn set_data(&mut self, table: Table) {
        self.data = Some(table);
    }
}

/// A dataset under observation.
///
/// Implementors embed a [`BenchmarkCore`] and expose it through `core` /
/// `core_mut`; the accessors below are provided on top of it. Operations a
/// kind does not support keep their defaults: `refresh` reports
/// [`BenchmarkError::Unimplemented`], the rest return benign empty values.
pub trait Benchmark: Send + Sync {
    /// Stable kind name, part of the identity key
    fn kind(&self) -> &'static str;

    fn core(&self) -> &BenchmarkCore;

    fn core_mut(&mut self) -> &mut BenchmarkCore;

    /// Fetch fresh data from the external source and replace the table.
    ///
    /// On failure the current table is left untouched. Never touches metric
    /// state.
    fn refresh(&mut self) -> BenchmarkResult<()> {
        Err(BenchmarkError::unimplemented(self.kind(), "refresh"))
    }

    /// Pure transform from a raw payload to a table
    fn process(&self, _raw: &RawData) -> BenchmarkResult<Table> {
        Ok(Table::default())
    }

    /// Citation count of the benchmark's paper
    fn get_citations(&self) -> BenchmarkResult<u64> {
        Ok(0)
    }

    /// Raw payload from the source, if the kind has one
    fn download(&self) -> BenchmarkResult<Option<RawData>> {
        Ok(None)
    }

    fn meta(&self) -> &BenchmarkMeta {
        self.core().meta()
    }

    fn name(&self) -> &str {
        &self.core().meta().name
    }

    fn instance_id(&self) -> InstanceId {
        self.core().instance_id()
    }

    /// Current processed table, `None` until populated
    fn data(&self) -> Option<&Table> {
        self.core().data()
    }

    fn set_data(&mut self, table: Table) {
        self.core_mut().set_data(table);
    }
}
