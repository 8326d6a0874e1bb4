//! Benchmark construction records read from CSV

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::benchmark::{BenchmarkMeta, Row, Scalar};

/// Result type alias for record loading
pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("Input has duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// One input row: ordered (column, value) pairs.
///
/// `name` is required at the file level; `paper_url`, `dataset_url` and
/// `ds_id` are optional, and any other columns are carried through to the
/// result table untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchmarkRecord {
    fields: Vec<(String, String)>,
}

impl BenchmarkRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self::default().with_field("name", name)
    }

    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
        self
    }

    /// Raw value of a column; empty strings count as absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn name(&self) -> &str {
        self.get("name").unwrap_or("unknown")
    }

    pub fn paper_url(&self) -> Option<&str> {
        self.get("paper_url")
    }

    pub fn dataset_url(&self) -> Option<&str> {
        self.get("dataset_url")
    }

    pub fn ds_id(&self) -> Option<&str> {
        self.get("ds_id")
    }

    pub fn meta(&self) -> BenchmarkMeta {
        BenchmarkMeta {
            name: self.name().to_string(),
            paper_url: self.paper_url().map(str::to_string),
            dataset_url: self.dataset_url().map(str::to_string),
            ds_id: self.ds_id().map(str::to_string),
        }
    }

    /// Input columns as result cells, in input order; blank values become `Null`
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        for (column, value) in &self.fields {
            let cell = if value.trim().is_empty() {
                Scalar::Null
            } else {
                Scalar::Text(value.clone())
            };
            row.set(column.clone(), cell);
        }
        row
    }
}

/// Read records from any CSV stream with a header row containing `name`
pub fn read_records<R: Read>(reader: R) -> RecordResult<Vec<BenchmarkRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if !headers.iter().any(|h| h == "name") {
        return Err(RecordError::MissingColumn("name"));
    }
    for (idx, header) in headers.iter().enumerate() {
        if headers.iter().take(idx).any(|earlier| earlier == header) {
            return Err(RecordError::DuplicateColumn(header.to_string()));
        }
    }

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let row = result?;
        records.push(BenchmarkRecord::from_fields(
            headers.iter().zip(row.iter()),
        ));
    }
    Ok(records)
}

/// Load benchmark records from a CSV file
pub fn load_records(path: impl AsRef<Path>) -> RecordResult<Vec<BenchmarkRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file)?;
    info!(path = %path.display(), count = records.len(), "Loaded benchmark records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "\
name,paper_url,dataset_url,description
GLUE-MNLI,https://arxiv.org/abs/1804.07461,https://huggingface.co/datasets/glue,Multi-Genre NLI
SQuAD-v2,https://arxiv.org/abs/1806.03822,,\"Stanford QA, v2\"
";

    #[test]
    fn test_read_records_keeps_column_order() {
        let records = read_records(INPUT.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let columns: Vec<&str> = records[0].fields().map(|(k, _)| k).collect();
        assert_eq!(columns, ["name", "paper_url", "dataset_url", "description"]);
        assert_eq!(records[1].get("description"), Some("Stanford QA, v2"));
    }

    #[test]
    fn test_blank_optional_fields_are_absent() {
        let records = read_records(INPUT.as_bytes()).unwrap();
        let squad = &records[1];
        assert_eq!(squad.name(), "SQuAD-v2");
        assert_eq!(squad.dataset_url(), None);
        assert_eq!(squad.ds_id(), None);

        let row = squad.to_row();
        assert_eq!(row.get("dataset_url"), Some(&Scalar::Null));
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn test_missing_name_column_rejected() {
        let err = read_records("title,url\nx,y\n".as_bytes()).unwrap_err();
        assert!(matches!(err, RecordError::MissingColumn("name")));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = read_records("name,url, url\nGLUE,a,b\n".as_bytes()).unwrap_err();
        assert!(matches!(err, RecordError::DuplicateColumn(ref column) if column == "url"));
    }

    #[test]
    fn test_blank_name_defaults_to_unknown() {
        let record = BenchmarkRecord::from_fields([("name", " "), ("ds_id", "org/ds")]);
        assert_eq!(record.name(), "unknown");
        let meta = record.meta();
        assert_eq!(meta.declared_id(), "org/ds");
    }

    #[test]
    fn test_load_records_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, RecordError::Io { .. }));
    }
}
