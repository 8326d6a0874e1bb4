//! Batch evaluation of metrics over benchmark records
//!
//! For each input record the [`Processor`] builds a benchmark, optionally
//! refreshes it, runs every configured metric, and emits one result row:
//! the input columns, then `static_<name>` per static metric, then
//! `dynamic_<name>` and `dynamic_<name>_history_count` per updatable metric.
//!
//! The processor is the only place where failures are downgraded: a failing
//! metric leaves its cell `Null`, is logged, and is counted in the
//! [`FailureReport`]. Processing always continues with the next cell.

pub mod report;

pub use report::FailureReport;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::benchmark::{Benchmark, BenchmarkFactory, BenchmarkResult, Row, Scalar, Table};
use crate::metrics::{Metric, MetricError, MetricResult, StaticMetric, UpdatableMetric};
use crate::records::BenchmarkRecord;

/// Whether the processor consults `needs_update` before running an updatable metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateGate {
    /// Run every updatable metric on every benchmark
    #[default]
    Always,
    /// Run only when the series is stale; otherwise report its latest value
    WhenStale,
}

impl fmt::Display for UpdateGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateGate::Always => f.write_str("always"),
            UpdateGate::WhenStale => f.write_str("when_stale"),
        }
    }
}

impl FromStr for UpdateGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always" => Ok(UpdateGate::Always),
            "when_stale" => Ok(UpdateGate::WhenStale),
            other => Err(format!(
                "unknown update gate '{other}' (expected 'always' or 'when_stale')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorOptions {
    pub update_gate: UpdateGate,
    /// Call `refresh` on each benchmark before running metrics
    pub refresh_before_run: bool,
}

/// Result table plus diagnostics for one batch
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub table: Table,
    pub report: FailureReport,
}

/// Applies configured metrics to a batch of benchmark records.
///
/// Metrics live as long as the processor, so caches and histories carry
/// over between batches processed by the same instance.
#[derive(Debug)]
pub struct Processor {
    static_metrics: Vec<StaticMetric>,
    updatable_metrics: Vec<UpdatableMetric>,
    options: ProcessorOptions,
}

impl Processor {
    pub fn new(static_metrics: Vec<StaticMetric>, updatable_metrics: Vec<UpdatableMetric>) -> Self {
        Self {
            static_metrics,
            updatable_metrics,
            options: ProcessorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProcessorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ProcessorOptions {
        self.options
    }

    pub fn static_metrics(&self) -> &[StaticMetric] {
        &self.static_metrics
    }

    pub fn updatable_metrics(&self) -> &[UpdatableMetric] {
        &self.updatable_metrics
    }

    /// Metric result columns in output order
    pub fn metric_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.static_metrics.iter().map(|m| m.column()).collect();
        for metric in &self.updatable_metrics {
            let column = metric.column();
            let count_column = format!("{column}_history_count");
            columns.push(column);
            columns.push(count_column);
        }
        columns
    }

    /// Result columns for a batch: every input column in first-seen order
    /// across all records, then [`Self::metric_columns`]. A metric column
    /// that repeats an input name keeps the input position.
    pub fn output_columns(&self, records: &[BenchmarkRecord]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let names = records
            .iter()
            .flat_map(|record| record.fields().map(|(name, _)| name.to_string()))
            .chain(self.metric_columns());
        for name in names {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        columns
    }

    /// Evaluate every record, producing one row per record in input order.
    ///
    /// Metric and construction failures never fail the batch; an error here
    /// means the result table itself could not be assembled.
    pub fn process(
        &self,
        records: &[BenchmarkRecord],
        factory: &dyn BenchmarkFactory,
    ) -> BenchmarkResult<ProcessOutput> {
        info!(
            records = records.len(),
            static_metrics = self.static_metrics.len(),
            updatable_metrics = self.updatable_metrics.len(),
            benchmark_kind = factory.kind(),
            "Processing benchmarks"
        );

        let mut report = FailureReport::default();
        let mut rows = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            debug!(
                index = idx + 1,
                total = records.len(),
                benchmark = %record.name(),
                "Processing benchmark"
            );

            let mut row = record.to_row();
            match factory.create(record) {
                Ok(mut benchmark) => {
                    if self.options.refresh_before_run {
                        self.refresh(benchmark.as_mut(), &mut report);
                    }
                    self.evaluate_into(benchmark.as_ref(), &mut row, &mut report);
                }
                Err(e) => {
                    report.construction_failures += 1;
                    if e.is_contract_violation() {
                        report.contract_violations += 1;
                        error!(benchmark = %record.name(), error = %e, "Benchmark construction violated contract");
                    } else {
                        warn!(benchmark = %record.name(), error = %e, "Failed to construct benchmark");
                    }
                    for column in self.metric_columns() {
                        row.set(column, Scalar::Null);
                    }
                }
            }
            rows.push(row);
        }

        report.rows_processed = rows.len();
        let table = Table::from_records_with_columns(self.output_columns(records), rows)?;

        info!(
            rows = report.rows_processed,
            missing_cells = report.total_failures(),
            contract_violations = report.contract_violations,
            "Processing complete"
        );

        Ok(ProcessOutput { table, report })
    }

    /// Run every metric on one benchmark and return its metric cells
    pub fn evaluate(&self, benchmark: &dyn Benchmark, report: &mut FailureReport) -> Row {
        let mut row = Row::new();
        self.evaluate_into(benchmark, &mut row, report);
        row
    }

    fn evaluate_into(&self, benchmark: &dyn Benchmark, row: &mut Row, report: &mut FailureReport) {
        for metric in &self.static_metrics {
            let column = metric.column();
            match metric.run(benchmark) {
                Ok(score) => row.set(column, score),
                Err(e) => {
                    Self::record_failure(report, &column, benchmark, &e);
                    row.set(column, Scalar::Null);
                }
            }
        }

        for metric in &self.updatable_metrics {
            let column = metric.column();
            let count_column = format!("{column}_history_count");

            match self.run_updatable(metric, benchmark, report) {
                Ok(score) => row.set(column.clone(), score),
                Err(e) => {
                    Self::record_failure(report, &column, benchmark, &e);
                    row.set(column.clone(), Scalar::Null);
                }
            }

            let count = match metric.history_len(benchmark) {
                Ok(len) => Scalar::from(len),
                Err(e) => {
                    warn!(metric = %column, benchmark = %benchmark.name(), error = %e, "History unavailable");
                    Scalar::Null
                }
            };
            row.set(count_column, count);
        }
    }

    fn run_updatable(
        &self,
        metric: &UpdatableMetric,
        benchmark: &dyn Benchmark,
        report: &mut FailureReport,
    ) -> MetricResult<f64> {
        if self.options.update_gate == UpdateGate::WhenStale && !metric.needs_update(benchmark)? {
            if let Some(latest) = metric.get_historical_values(benchmark)?.latest() {
                debug!(
                    metric = %metric.name(),
                    benchmark = %benchmark.name(),
                    timestamp = %latest.timestamp,
                    "Series fresh; reusing latest value"
                );
                report.fresh_reused += 1;
                return Ok(latest.score);
            }
        }
        metric.run(benchmark)
    }

    fn refresh(&self, benchmark: &mut dyn Benchmark, report: &mut FailureReport) {
        if let Err(e) = benchmark.refresh() {
            report.refresh_failures += 1;
            if e.is_contract_violation() {
                report.contract_violations += 1;
                error!(benchmark = %benchmark.name(), error = %e, "Refresh violated contract");
            } else {
                warn!(benchmark = %benchmark.name(), error = %e, "Refresh failed; using current data");
            }
        }
    }

    fn record_failure(
        report: &mut FailureReport,
        column: &str,
        benchmark: &dyn Benchmark,
        error: &MetricError,
    ) {
        let contract_violation = error.is_contract_violation();
        if contract_violation {
            error!(metric = %column, benchmark = %benchmark.name(), error = %error, "Metric contract violation");
        } else {
            warn!(metric = %column, benchmark = %benchmark.name(), error = %error, "Metric failed; cell left missing");
        }
        report.record_failure(column, contract_violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{
        BenchmarkCore, BenchmarkError, BenchmarkMeta, ExampleFactory, IdentityPolicy,
    };
    use crate::clock::ManualClock;
    use crate::metrics::{CitationCountMetric, NumSamplesMetric};
    use chrono::{Duration, NaiveDate};
    use std::sync::Arc;

    fn records() -> Vec<BenchmarkRecord> {
        vec![
            BenchmarkRecord::new("GLUE-MNLI").with_field("description", "NLI"),
            BenchmarkRecord::new("bad").with_field("description", "fails"),
            BenchmarkRecord::new("CoLA").with_field("description", "acceptability"),
        ]
    }

    fn picky_metric() -> StaticMetric {
        StaticMetric::from_fn("picky", "fails on 'bad'", |b: &dyn Benchmark| {
            if b.name() == "bad" {
                Err(MetricError::computation("picky", b.name(), "rejected"))
            } else {
                Ok(1.0)
            }
        })
    }

    #[test]
    fn test_partial_failure_is_contained() {
        let processor = Processor::new(
            vec![NumSamplesMetric::build(), picky_metric()],
            vec![CitationCountMetric::build()],
        );
        let output = processor.process(&records(), &ExampleFactory).unwrap();
        let table = &output.table;

        assert_eq!(table.height(), 3);
        assert_eq!(
            table.columns(),
            [
                "name",
                "description",
                "static_num_samples",
                "static_picky",
                "dynamic_citation_count",
                "dynamic_citation_count_history_count"
            ]
        );
        assert_eq!(table.get(1, "static_picky"), Some(Scalar::Null));
        assert_eq!(table.get(1, "static_num_samples"), Some(Scalar::Float(1.0)));
        assert_eq!(table.get(0, "static_picky"), Some(Scalar::Float(1.0)));
        assert_eq!(table.get(2, "name"), Some(Scalar::from("CoLA")));
        assert_eq!(
            table.get(1, "dynamic_citation_count_history_count"),
            Some(Scalar::Int(1))
        );

        assert_eq!(output.report.rows_processed, 3);
        assert_eq!(output.report.total_failures(), 1);
        assert_eq!(output.report.failures_for("static_picky"), 1);
        assert_eq!(output.report.contract_violations, 0);
    }

    #[test]
    fn test_failed_updatable_reports_existing_history_len() {
        let processor = Processor::new(
            vec![],
            vec![UpdatableMetric::from_fn("flaky", "", |b: &dyn Benchmark| {
                Err(MetricError::computation("flaky", b.name(), "down"))
            })],
        );
        let output = processor.process(&records()[..1], &ExampleFactory).unwrap();
        assert_eq!(output.table.get(0, "dynamic_flaky"), Some(Scalar::Null));
        assert_eq!(
            output.table.get(0, "dynamic_flaky_history_count"),
            Some(Scalar::Int(0))
        );
    }

    struct NoRefresh {
        core: BenchmarkCore,
    }

    impl Benchmark for NoRefresh {
        fn kind(&self) -> &'static str {
            "NoRefresh"
        }

        fn core(&self) -> &BenchmarkCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut BenchmarkCore {
            &mut self.core
        }
    }

    /// Builds `NoRefresh` benchmarks, and refuses records named "broken"
    struct TestFactory;

    impl BenchmarkFactory for TestFactory {
        fn kind(&self) -> &'static str {
            "NoRefresh"
        }

        fn create(&self, record: &BenchmarkRecord) -> BenchmarkResult<Box<dyn Benchmark>> {
            if record.name() == "broken" {
                return Err(BenchmarkError::process("cannot build"));
            }
            Ok(Box::new(NoRefresh {
                core: BenchmarkCore::new(BenchmarkMeta::new(record.name())),
            }))
        }
    }

    #[test]
    fn test_construction_failure_leaves_metric_cells_missing() {
        let processor = Processor::new(vec![NumSamplesMetric::build()], vec![]);
        let records = vec![BenchmarkRecord::new("ok"), BenchmarkRecord::new("broken")];
        let output = processor.process(&records, &TestFactory).unwrap();

        assert_eq!(output.table.height(), 2);
        assert_eq!(
            output.table.get(0, "static_num_samples"),
            Some(Scalar::Float(0.0))
        );
        assert_eq!(output.table.get(1, "static_num_samples"), Some(Scalar::Null));
        assert_eq!(output.report.construction_failures, 1);
    }

    #[test]
    fn test_unimplemented_refresh_is_a_contract_violation() {
        let processor = Processor::new(vec![NumSamplesMetric::build()], vec![]).with_options(
            ProcessorOptions {
                refresh_before_run: true,
                ..Default::default()
            },
        );
        let output = processor
            .process(&[BenchmarkRecord::new("ok")], &TestFactory)
            .unwrap();

        assert_eq!(output.report.refresh_failures, 1);
        assert_eq!(output.report.contract_violations, 1);
        // Metrics still ran against the current data
        assert_eq!(
            output.table.get(0, "static_num_samples"),
            Some(Scalar::Float(0.0))
        );
    }

    #[test]
    fn test_unavailable_source_is_an_ordinary_refresh_failure() {
        let processor = Processor::new(vec![NumSamplesMetric::build()], vec![]).with_options(
            ProcessorOptions {
                refresh_before_run: true,
                ..Default::default()
            },
        );
        let output = processor.process(&records(), &ExampleFactory).unwrap();
        assert_eq!(output.report.refresh_failures, 3);
        assert_eq!(output.report.contract_violations, 0);
        assert_eq!(
            output.table.get(0, "static_num_samples"),
            Some(Scalar::Float(1.0))
        );
    }

    #[test]
    fn test_when_stale_gate_reuses_fresh_values() {
        let start = NaiveDate::from_ymd_opt(2025, 4, 6)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        let clock = ManualClock::new(start);
        let metric = CitationCountMetric::build()
            .with_clock(Arc::new(clock.clone()))
            .with_identity(IdentityPolicy::Declared);
        let processor = Processor::new(vec![], vec![metric]).with_options(ProcessorOptions {
            update_gate: UpdateGate::WhenStale,
            ..Default::default()
        });
        let batch = vec![BenchmarkRecord::new("GLUE").with_field("citations", "5")];

        let first = processor.process(&batch, &ExampleFactory).unwrap();
        assert_eq!(
            first.table.get(0, "dynamic_citation_count_history_count"),
            Some(Scalar::Int(1))
        );

        let second = processor.process(&batch, &ExampleFactory).unwrap();
        assert_eq!(second.report.fresh_reused, 1);
        assert_eq!(
            second.table.get(0, "dynamic_citation_count"),
            Some(Scalar::Float(5.0))
        );
        assert_eq!(
            second.table.get(0, "dynamic_citation_count_history_count"),
            Some(Scalar::Int(1))
        );

        clock.advance(Duration::days(31));
        let third = processor.process(&batch, &ExampleFactory).unwrap();
        assert_eq!(third.report.fresh_reused, 0);
        assert_eq!(
            third.table.get(0, "dynamic_citation_count_history_count"),
            Some(Scalar::Int(2))
        );
    }

    #[test]
    fn test_empty_input_keeps_metric_columns() {
        let processor = Processor::new(
            vec![NumSamplesMetric::build()],
            vec![CitationCountMetric::build()],
        );
        let output = processor.process(&[], &ExampleFactory).unwrap();
        assert!(output.table.is_empty());
        assert_eq!(
            output.table.columns(),
            [
                "static_num_samples",
                "dynamic_citation_count",
                "dynamic_citation_count_history_count"
            ]
        );
        assert!(output.report.is_clean());
    }

    #[test]
    fn test_input_columns_stay_ahead_of_metrics_with_ragged_records() {
        let processor = Processor::new(vec![NumSamplesMetric::build()], vec![]);
        let records = vec![
            BenchmarkRecord::new("A"),
            BenchmarkRecord::new("B").with_field("paper_url", "http://x"),
        ];
        let output = processor.process(&records, &ExampleFactory).unwrap();
        let table = &output.table;

        assert_eq!(table.columns(), ["name", "paper_url", "static_num_samples"]);
        assert_eq!(table.get(0, "paper_url"), Some(Scalar::Null));
        assert_eq!(table.get(1, "paper_url"), Some(Scalar::from("http://x")));
        assert_eq!(table.get(1, "static_num_samples"), Some(Scalar::Float(1.0)));
    }

    #[test]
    fn test_gate_parse() {
        assert_eq!("when-stale".parse::<UpdateGate>(), Ok(UpdateGate::WhenStale));
        assert_eq!("ALWAYS".parse::<UpdateGate>(), Ok(UpdateGate::Always));
        assert!("sometimes".parse::<UpdateGate>().is_err());
    }
}
