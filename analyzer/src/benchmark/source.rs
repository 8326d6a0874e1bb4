//! Dataset-card sources
//!
//! A [`CardSource`] yields raw Hugging Face dataset-card records (one JSON
//! object per dataset, keyed like the `dataset_cards_with_metadata` export:
//! `datasetId`, `createdAt`, `downloads`, `likes`, `task_categories`, `card`,
//! `card_parsed`, ...).
//!
//! [`YamlCardSource`] reads the split multi-document YAML export
//! (`all_dataset_info_part<N>.yaml`, one document per record, each followed
//! by `---`).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::{debug, info};

use super::{BenchmarkError, BenchmarkResult, RawData};

/// Field holding the Hugging Face dataset identifier in card records
pub const DATASET_ID_FIELD: &str = "datasetId";

/// Prefix of the split export file names
pub const SPLIT_FILE_PREFIX: &str = "all_dataset_info_part";

/// Shared handle to a card source
pub type SharedCardSource = Arc<dyn CardSource>;

/// Read access to a collection of dataset-card records
pub trait CardSource: Send + Sync + fmt::Debug {
    /// Human-readable source name used in error messages
    fn name(&self) -> String;

    /// All records, in source order
    fn records(&self) -> BenchmarkResult<Arc<Vec<RawData>>>;

    /// Records whose `datasetId` equals `ds_id`
    fn find(&self, ds_id: &str) -> BenchmarkResult<Vec<RawData>> {
        let records = self.records()?;
        Ok(records
            .iter()
            .filter(|record| {
                record.get(DATASET_ID_FIELD).and_then(RawData::as_str) == Some(ds_id)
            })
            .cloned()
            .collect())
    }
}

/// Parse a multi-document YAML stream, skipping empty documents
pub fn parse_documents(content: &str) -> Result<Vec<RawData>, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = RawData::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

/// Read every document of one YAML file
pub fn read_documents(path: &Path) -> BenchmarkResult<Vec<RawData>> {
    let content = fs::read_to_string(path).map_err(|e| {
        BenchmarkError::source_unavailable(path.display().to_string(), e.to_string())
    })?;
    parse_documents(&content).map_err(|e| {
        BenchmarkError::source_unavailable(
            path.display().to_string(),
            format!("invalid YAML: {e}"),
        )
    })
}

/// Part number of a split export file, e.g. `all_dataset_info_part12.yaml` → 12
pub fn split_part_number(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(SPLIT_FILE_PREFIX)?
        .parse()
        .ok()
}

/// Card records read from a YAML file or a directory of split exports.
///
/// Files are loaded on the first call to `records` and kept for the life of
/// the source.
#[derive(Debug)]
pub struct YamlCardSource {
    path: PathBuf,
    loaded: RwLock<Option<Arc<Vec<RawData>>>>,
}

impl YamlCardSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// YAML files this source reads, split parts first in part order
    pub fn files(&self) -> BenchmarkResult<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        let entries = fs::read_dir(&self.path)
            .map_err(|e| BenchmarkError::source_unavailable(self.name(), e.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|ext| ext.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();

        files.sort_by(|a, b| {
            let ka = (split_part_number(a).unwrap_or(u32::MAX), a.file_name());
            let kb = (split_part_number(b).unwrap_or(u32::MAX), b.file_name());
            ka.cmp(&kb)
        });
        Ok(files)
    }

    fn load(&self) -> BenchmarkResult<Vec<RawData>> {
        let files = self.files()?;
        if files.is_empty() {
            return Err(BenchmarkError::source_unavailable(
                self.name(),
                "no YAML files found",
            ));
        }

        let mut records = Vec::new();
        for file in &files {
            let documents = read_documents(file)?;
            debug!(file = %file.display(), count = documents.len(), "Read card documents");
            records.extend(documents);
        }
        info!(
            source = %self.name(),
            files = files.len(),
            records = records.len(),
            "Loaded dataset cards"
        );
        Ok(records)
    }
}

impl CardSource for YamlCardSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn records(&self) -> BenchmarkResult<Arc<Vec<RawData>>> {
        {
            let guard = self.loaded.read().map_err(|_| {
                BenchmarkError::source_unavailable(self.name(), "cache lock poisoned")
            })?;
            if let Some(records) = guard.as_ref() {
                return Ok(Arc::clone(records));
            }
        }

        let mut guard = self
            .loaded
            .write()
            .map_err(|_| BenchmarkError::source_unavailable(self.name(), "cache lock poisoned"))?;
        if let Some(records) = guard.as_ref() {
            return Ok(Arc::clone(records));
        }
        let records = Arc::new(self.load()?);
        *guard = Some(Arc::clone(&records));
        Ok(records)
    }
}

/// Card records held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCardSource {
    records: Arc<Vec<RawData>>,
}

impl MemoryCardSource {
    pub fn new(records: Vec<RawData>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }
}

impl CardSource for MemoryCardSource {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn records(&self) -> BenchmarkResult<Arc<Vec<RawData>>> {
        Ok(Arc::clone(&self.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PART_ONE: &str = "\
datasetId: TIGER-Lab/MMLU-Pro
createdAt: '2024-05-08T13:03:23.000Z'
downloads: 1200
likes: 300
task_categories:
- question-answering
card_parsed:
- license: mit
---
datasetId: nyu-mll/glue
createdAt: '2022-03-02T23:29:22.000Z'
downloads: 500
likes: 40
task_categories: []
---
";

    const PART_TWO: &str = "\
datasetId: rajpurkar/squad_v2
downloads: 10
likes: 1
---
";

    #[test]
    fn test_parse_documents_skips_trailing_separator() {
        let docs = parse_documents(PART_ONE).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["datasetId"], "TIGER-Lab/MMLU-Pro");
        assert_eq!(docs[1]["likes"], 40);
    }

    #[test]
    fn test_directory_reads_parts_in_numeric_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("all_dataset_info_part10.yaml"), PART_TWO).unwrap();
        fs::write(dir.path().join("all_dataset_info_part2.yaml"), PART_ONE).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = YamlCardSource::new(dir.path());
        let files = source.files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(split_part_number(&files[0]), Some(2));
        assert_eq!(split_part_number(&files[1]), Some(10));

        let records = source.records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["datasetId"], "rajpurkar/squad_v2");
    }

    #[test]
    fn test_find_filters_by_dataset_id() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("all_dataset_info_part1.yaml");
        fs::write(&file, PART_ONE).unwrap();

        let source = YamlCardSource::new(&file);
        let found = source.find("nyu-mll/glue").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["downloads"], 500);
        assert!(source.find("missing/dataset").unwrap().is_empty());
    }

    #[test]
    fn test_missing_path_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = YamlCardSource::new(dir.path().join("nope"));
        let err = source.records().unwrap_err();
        assert!(matches!(err, BenchmarkError::SourceUnavailable { .. }));

        let empty = YamlCardSource::new(dir.path());
        assert!(empty.records().is_err());
    }

    #[test]
    fn test_invalid_yaml_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("all_dataset_info_part1.yaml");
        fs::write(&file, "datasetId: [unclosed\n").unwrap();
        let err = YamlCardSource::new(&file).records().unwrap_err();
        assert!(err.to_string().contains("invalid YAML"));
    }
}
