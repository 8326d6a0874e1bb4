//! Benchmark saturation analyzer
//!
//! Tracks how benchmark datasets evolve by attaching metrics to them. Static
//! metrics are computed once per benchmark and memoized; updatable metrics
//! are recomputed on demand and keep a timestamped history with an advisory
//! staleness check.
//!
//! Modules:
//! - [`benchmark`]: benchmark entities, tables, identity, card sources
//! - [`metrics`]: static and updatable metrics, built-ins, registry
//! - [`processor`]: batch evaluation with per-cell failure isolation
//! - [`records`] / [`report`]: CSV input and CSV/JSON output
//! - [`config`]: layered TOML + environment configuration
//! - [`clock`]: injectable wall clock and history timestamps

pub mod benchmark;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod processor;
pub mod records;
pub mod report;

pub use benchmark::{
    Benchmark, BenchmarkError, BenchmarkFactory, BenchmarkMeta, BenchmarkResult, IdentityPolicy,
    Scalar, Table,
};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{AnalyzerConfig, ConfigError};
pub use metrics::{
    Metric, MetricError, MetricRegistry, MetricResult, StaticMetric, UpdatableMetric,
};
pub use processor::{FailureReport, ProcessOutput, Processor, ProcessorOptions, UpdateGate};
pub use records::{load_records, BenchmarkRecord, RecordError};
pub use report::{write_history_json, write_table_csv, ReportError};
