//! Benchmark backed by a Hugging Face dataset-card record

use serde_json::Value;
use tracing::debug;

use super::source::SharedCardSource;
use super::{
    Benchmark, BenchmarkCore, BenchmarkError, BenchmarkMeta, BenchmarkResult, RawData, Row,
    Scalar, Table,
};

/// A benchmark whose data is the dataset card matching its `ds_id`
/// (falling back to its name when no `ds_id` was given).
///
/// The processed table has a single row with `created_at` (date part of
/// `createdAt`), `hf_downloads`, `hf_likes` and `task_categories`.
#[derive(Debug)]
pub struct CardBenchmark {
    core: BenchmarkCore,
    source: SharedCardSource,
}

impl CardBenchmark {
    pub const KIND: &'static str = "CardBenchmark";

    pub fn new(meta: BenchmarkMeta, source: SharedCardSource) -> Self {
        Self {
            core: BenchmarkCore::new(meta),
            source,
        }
    }

    /// Dataset identifier looked up in the card source
    pub fn ds_id(&self) -> &str {
        self.core.meta().declared_id()
    }
}

/// `2025-04-06T12:34:56.000Z` → `2025-04-06`; also handles `2025-04-06 12:34:56+00:00`
fn date_part(created_at: &str) -> &str {
    created_at
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(created_at)
}

impl Benchmark for CardBenchmark {
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
                self.source.name(),
                format!("no dataset card for '{}'", self.ds_id()),
            )
        })?;
        let table = self.process(&raw)?;
        debug!(benchmark = %self.name(), ds_id = %self.ds_id(), "Refreshed card benchmark");
        self.core.set_data(table);
        Ok(())
    }

    /// Accepts either the list returned by `download` (first match is used)
    /// or a single card object.
    fn process(&self, raw: &RawData) -> BenchmarkResult<Table> {
        let card = match raw {
            Value::Array(items) => items
                .first()
                .ok_or_else(|| BenchmarkError::process("no card records to process"))?,
            other => other,
        };
        let card = card
            .as_object()
            .ok_or_else(|| BenchmarkError::process("card record is not an object"))?;

        let created_at = card
            .get("createdAt")
            .and_then(Value::as_str)
            .map(|s| Scalar::from(date_part(s)))
            .unwrap_or(Scalar::Null);
        let field = |key: &str| card.get(key).map(Scalar::from_json).unwrap_or(Scalar::Null);

        let row = Row::new()
            .with("created_at", created_at)
            .with("hf_downloads", field("downloads"))
            .with("hf_likes", field("likes"))
            .with("task_categories", field("task_categories"));
        Table::from_records(vec![row])
    }

    fn download(&self) -> BenchmarkResult<Option<RawData>> {
        let matches = self.source.find(self.ds_id())?;
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::Array(matches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::MemoryCardSource;
    use serde_json::json;
    use std::sync::Arc;

    fn source() -> SharedCardSource {
        Arc::new(MemoryCardSource::new(vec![
            json!({
                "datasetId": "TIGER-Lab/MMLU-Pro",
                "createdAt": "2024-05-08T13:03:23.000Z",
                "downloads": 1200,
                "likes": 300,
                "task_categories": ["question-answering"]
            }),
            json!({"datasetId": "nyu-mll/glue", "downloads": 5, "likes": 1}),
        ]))
    }

    #[test]
    fn test_refresh_builds_one_row() {
        let meta = BenchmarkMeta::new("MMLU-Pro").with_ds_id("TIGER-Lab/MMLU-Pro");
        let mut bench = CardBenchmark::new(meta, source());
        assert!(bench.data().is_none());

        bench.refresh().unwrap();
        let data = bench.data().unwrap();
        assert_eq!(data.height(), 1);
        assert_eq!(
            data.columns(),
            ["created_at", "hf_downloads", "hf_likes", "task_categories"]
        );
        assert_eq!(data.get(0, "created_at"), Some(Scalar::from("2024-05-08")));
        assert_eq!(data.get(0, "hf_downloads"), Some(Scalar::Int(1200)));
        assert_eq!(
            data.get(0, "task_categories"),
            Some(Scalar::from("question-answering"))
        );
    }

    #[test]
    fn test_missing_card_fields_are_null() {
        let meta = BenchmarkMeta::new("nyu-mll/glue");
        let mut bench = CardBenchmark::new(meta, source());
        bench.refresh().unwrap();
        let data = bench.data().unwrap();
        assert_eq!(data.get(0, "created_at"), Some(Scalar::Null));
        assert_eq!(data.get(0, "hf_likes"), Some(Scalar::Int(1)));
    }

    #[test]
    fn test_unknown_dataset_is_source_unavailable() {
        let meta = BenchmarkMeta::new("x").with_ds_id("nobody/nothing");
        let mut bench = CardBenchmark::new(meta, source());
        let err = bench.refresh().unwrap_err();
        assert!(matches!(err, BenchmarkError::SourceUnavailable { .. }));
        assert!(bench.data().is_none());
        assert!(bench.download().unwrap().is_none());
    }

    #[test]
    fn test_process_rejects_empty_list() {
        let bench = CardBenchmark::new(BenchmarkMeta::new("x"), source());
        assert!(bench.process(&json!([])).is_err());
        assert!(bench.process(&json!("text")).is_err());
    }

    #[test]
    fn test_date_part() {
        assert_eq!(date_part("2025-04-06T12:34:56"), "2025-04-06");
        assert_eq!(date_part("2025-04-06 12:34:56+00:00"), "2025-04-06");
        assert_eq!(date_part("2025-04-06"), "2025-04-06");
    }
}
