//! Writing result tables and history exports to disk

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use polars::{io::csv::QuoteStyle, prelude::*};
use thiserror::Error;
use tracing::info;

use crate::benchmark::Table;
use crate::metrics::HistorySnapshot;

/// Result type alias for output operations
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("DataFrame error: {0}")]
    DataFrame(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write a table as CSV with a header row; null cells are empty fields
pub fn write_table<W: Write>(table: &Table, writer: W) -> ReportResult<()> {
    let mut frame = table.frame().clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(b',')
        .with_quote_style(QuoteStyle::Necessary)
        .finish(&mut frame)?;
    Ok(())
}

/// Write to `<path>.tmp` then rename over `path`, so readers never see a
/// half-written file.
fn write_atomically(
    path: &Path,
    write: impl FnOnce(&mut File) -> ReportResult<()>,
) -> ReportResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(ReportError::io(parent))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = File::create(&temp_path).map_err(ReportError::io(&temp_path))?;
    write(&mut file)?;
    file.sync_all().map_err(ReportError::io(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(ReportError::io(path))?;
    Ok(())
}

/// Write the result table to a CSV file
pub fn write_table_csv(table: &Table, path: impl AsRef<Path>) -> ReportResult<()> {
    let path = path.as_ref();
    write_atomically(path, |file| write_table(table, file))?;
    info!(path = %path.display(), rows = table.height(), "Results saved");
    Ok(())
}

/// Export updatable-metric histories as pretty JSON
pub fn write_history_json(
    snapshots: &[HistorySnapshot],
    path: impl AsRef<Path>,
) -> ReportResult<()> {
    let path = path.as_ref();
    write_atomically(path, |file| {
        serde_json::to_writer_pretty(&mut *file, snapshots)?;
        file.write_all(b"\n").map_err(ReportError::io(path))
    })?;
    info!(path = %path.display(), metrics = snapshots.len(), "History exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::Scalar;
    use std::collections::BTreeMap;

    fn table() -> Table {
        Table::from_rows(
            ["name", "description", "static_num_samples"],
            vec![
                vec!["GLUE".into(), "a, b".into(), Scalar::Float(1.0)],
                vec!["bad".into(), Scalar::Null, Scalar::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_write_table_quotes_and_blanks() {
        let mut out = Vec::new();
        write_table(&table(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("name,description,static_num_samples\n"));
        assert!(text.contains("GLUE,\"a, b\","));
        assert!(text.ends_with("bad,,\n"));

        let mut reader = ::csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<::csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "a, b");
        assert_eq!(rows[0][2].parse::<f64>().unwrap(), 1.0);
        assert_eq!(&rows[1][2], "");
    }

    #[test]
    fn test_write_table_csv_creates_dirs_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("enhanced.csv");
        write_table_csv(&table(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("name,description,static_num_samples\n"));
        assert!(!dir.path().join("out").join("enhanced.csv.tmp").exists());
    }

    #[test]
    fn test_write_history_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let snapshot = HistorySnapshot {
            metric: "citation_count".into(),
            update_frequency_days: 30,
            series: BTreeMap::new(),
        };
        write_history_json(&[snapshot.clone()], &path).unwrap();

        let back: Vec<HistorySnapshot> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![snapshot]);
    }
}
