//! Diagnostic summary of a processing batch

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Failure counts collected while building a result table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Input records processed (one output row each)
    pub rows_processed: usize,
    /// Result column → number of cells left missing
    pub failures_by_metric: BTreeMap<String, usize>,
    /// Failures that were programming-contract violations (also counted per metric)
    pub contract_violations: usize,
    /// Records whose benchmark could not be constructed
    pub construction_failures: usize,
    /// Benchmarks whose refresh failed before metrics ran
    pub refresh_failures: usize,
    /// Updatable cells served from history because the series was still fresh
    pub fresh_reused: usize,
}

impl FailureReport {
    pub(crate) fn record_failure(&mut self, column: &str, contract_violation: bool) {
        *self
            .failures_by_metric
            .entry(column.to_string())
            .or_insert(0) += 1;
        if contract_violation {
            self.contract_violations += 1;
        }
    }

    /// Missing metric cells across all columns
    pub fn total_failures(&self) -> usize {
        self.failures_by_metric.values().sum()
    }

    pub fn failures_for(&self, column: &str) -> usize {
        self.failures_by_metric.get(column).copied().unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.total_failures() == 0
            && self.construction_failures == 0
            && self.refresh_failures == 0
    }

    /// Render as a short Markdown report
    pub fn format_summary(&self) -> String {
        let mut report = String::new();

        report.push_str("# Processing Summary\n\n");
        report.push_str(&format!(
            "| Metric | Value |\n\
             |--------|-------|\n\
             | Rows Processed | {} |\n\
             | Missing Cells | {} |\n\
             | Contract Violations | {} |\n\
             | Construction Failures | {} |\n\
             | Refresh Failures | {} |\n\
             | Fresh Values Reused | {} |\n\n",
            self.rows_processed,
            self.total_failures(),
            self.contract_violations,
            self.construction_failures,
            self.refresh_failures,
            self.fresh_reused
        ));

        if !self.failures_by_metric.is_empty() {
            report.push_str("## Failures by Column\n\n");
            report.push_str("| Column | Missing |\n|--------|---------|\n");
            for (column, count) in &self.failures_by_metric {
                report.push_str(&format!("| {} | {} |\n", column, count));
            }
            report.push('\n');
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report = FailureReport {
            rows_processed: 3,
            ..Default::default()
        };
        assert!(report.is_clean());

        report.record_failure("static_num_samples", false);
        report.record_failure("static_num_samples", false);
        report.record_failure("dynamic_citation_count", true);

        assert_eq!(report.total_failures(), 3);
        assert_eq!(report.failures_for("static_num_samples"), 2);
        assert_eq!(report.failures_for("static_other"), 0);
        assert_eq!(report.contract_violations, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_format_summary() {
        let mut report = FailureReport {
            rows_processed: 2,
            ..Default::default()
        };
        let clean = report.format_summary();
        assert!(clean.contains("| Rows Processed | 2 |"));
        assert!(!clean.contains("Failures by Column"));

        report.record_failure("static_num_hf_likes", false);
        let summary = report.format_summary();
        assert!(summary.contains("| Missing Cells | 1 |"));
        assert!(summary.contains("| static_num_hf_likes | 1 |"));
    }
}
