//! Append-only time series kept by updatable metrics

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use super::{MetricError, MetricResult};
use crate::benchmark::BenchmarkKey;
use crate::clock::Timestamp;

/// One recorded value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: Timestamp,
    pub score: f64,
}

impl HistoryEntry {
    pub fn new(timestamp: impl Into<Timestamp>, score: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            score,
        }
    }
}

/// Read-only copy of one benchmark's series, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoricalValues(Vec<HistoryEntry>);

impl HistoricalValues {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.0.iter()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    /// Entry with the greatest timestamp (not necessarily the last inserted)
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.0.iter().max_by_key(|entry| entry.timestamp)
    }

    /// Most recently inserted entry
    pub fn last_recorded(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    /// Score recorded at a rendered timestamp, e.g. `2025-04-06T12:34:56.789012`
    pub fn get(&self, timestamp: &str) -> Option<f64> {
        let wanted: Timestamp = timestamp.parse().ok()?;
        self.0
            .iter()
            .rev()
            .find(|entry| entry.timestamp == wanted)
            .map(|entry| entry.score)
    }

    /// `(rendered timestamp, score)` pairs in insertion order
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        self.0
            .iter()
            .map(|entry| (entry.timestamp.to_string(), entry.score))
            .collect()
    }
}

impl<'a> IntoIterator for &'a HistoricalValues {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

type Series = Arc<Mutex<Vec<HistoryEntry>>>;

/// Identity key → series.
///
/// Appends to one key are serialized by that key's lock; other keys are
/// unaffected. Entries are never rewritten or removed.
#[derive(Debug, Default)]
pub(crate) struct HistoryStore {
    series: RwLock<HashMap<BenchmarkKey, Series>>,
}

impl HistoryStore {
    fn series(&self, key: &BenchmarkKey) -> MetricResult<Series> {
        {
            let map = self.series.read().map_err(|_| MetricError::LockPoisoned)?;
            if let Some(series) = map.get(key) {
                return Ok(Arc::clone(series));
            }
        }
        let mut map = self.series.write().map_err(|_| MetricError::LockPoisoned)?;
        Ok(Arc::clone(map.entry(key.clone()).or_default()))
    }

    /// Append one entry built while the key's lock is held, so entries of
    /// one series are stamped in the order they are appended.
    pub(crate) fn append_with(
        &self,
        key: &BenchmarkKey,
        make: impl FnOnce() -> HistoryEntry,
    ) -> MetricResult<(HistoryEntry, usize)> {
        let series = self.series(key)?;
        let mut entries = series.lock().map_err(|_| MetricError::LockPoisoned)?;
        let entry = make();
        entries.push(entry);
        Ok((entry, entries.len()))
    }

    pub(crate) fn extend(
        &self,
        key: &BenchmarkKey,
        new_entries: impl IntoIterator<Item = HistoryEntry>,
    ) -> MetricResult<usize> {
        let series = self.series(key)?;
        let mut entries = series.lock().map_err(|_| MetricError::LockPoisoned)?;
        entries.extend(new_entries);
        Ok(entries.len())
    }

    pub(crate) fn get(&self, key: &BenchmarkKey) -> MetricResult<HistoricalValues> {
        let series = {
            let map = self.series.read().map_err(|_| MetricError::LockPoisoned)?;
            match map.get(key) {
                Some(series) => Arc::clone(series),
                None => return Ok(HistoricalValues::default()),
            }
        };
        let entries = series.lock().map_err(|_| MetricError::LockPoisoned)?;
        Ok(HistoricalValues(entries.clone()))
    }

    pub(crate) fn snapshot(&self) -> MetricResult<BTreeMap<String, HistoricalValues>> {
        let map = self.series.read().map_err(|_| MetricError::LockPoisoned)?;
        let mut out = BTreeMap::new();
        for (key, series) in map.iter() {
            let entries = series.lock().map_err(|_| MetricError::LockPoisoned)?;
            if !entries.is_empty() {
                out.insert(key.to_string(), HistoricalValues(entries.clone()));
            }
        }
        Ok(out)
    }
}

/// Serializable dump of every series one updatable metric holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub metric: String,
    pub update_frequency_days: u32,
    pub series: BTreeMap<String, HistoricalValues>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{BenchmarkMeta, ExampleBenchmark, IdentityPolicy};
    use chrono::NaiveDate;

    fn ts(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 4, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
            .into()
    }

    #[test]
    fn test_latest_is_max_by_value() {
        let values = HistoricalValues(vec![
            HistoryEntry::new(ts(10), 1.0),
            HistoryEntry::new(ts(20), 2.0),
            HistoryEntry::new(ts(5), 3.0),
        ]);
        assert_eq!(values.latest().map(|e| e.score), Some(2.0));
        assert_eq!(values.last_recorded().map(|e| e.score), Some(3.0));
    }

    #[test]
    fn test_get_by_rendered_timestamp() {
        let values = HistoricalValues(vec![HistoryEntry::new(ts(6), 4.5)]);
        assert_eq!(values.get("2025-04-06T12:00:00.000000"), Some(4.5));
        assert_eq!(values.get("2025-04-06T12:00:00"), Some(4.5));
        assert_eq!(values.get("2025-04-07T12:00:00"), None);
        assert_eq!(values.get("garbage"), None);
        assert_eq!(
            values.to_pairs(),
            vec![("2025-04-06T12:00:00.000000".to_string(), 4.5)]
        );
    }

    #[test]
    fn test_store_keeps_duplicate_timestamps() {
        let store = HistoryStore::default();
        let a = IdentityPolicy::Instance.key_for(&ExampleBenchmark::new(BenchmarkMeta::new("a")));

        let (_, len) = store
            .append_with(&a, || HistoryEntry::new(ts(1), 1.0))
            .unwrap();
        assert_eq!(len, 1);
        let (entry, len) = store
            .append_with(&a, || HistoryEntry::new(ts(1), 2.0))
            .unwrap();
        assert_eq!(len, 2);
        assert_eq!(entry.score, 2.0);

        assert_eq!(store.get(&a).unwrap().len(), 2);
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_serializes_as_pairs() {
        let mut series = BTreeMap::new();
        series.insert(
            "ExampleBenchmark:glue".to_string(),
            HistoricalValues(vec![HistoryEntry::new(ts(6), 10.0)]),
        );
        let snapshot = HistorySnapshot {
            metric: "citation_count".to_string(),
            update_frequency_days: 30,
            series,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json["series"]["ExampleBenchmark:glue"][0]["timestamp"],
            "2025-04-06T12:00:00.000000"
        );
        assert_eq!(json["series"]["ExampleBenchmark:glue"][0]["score"], 10.0);
    }
}
