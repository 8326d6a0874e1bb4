//! In-memory tabular data held by benchmarks and produced by the processor
//!
//! A [`Table`] wraps a polars [`DataFrame`]. Rows are assembled as [`Row`]s
//! of [`Scalar`] cells and unified into typed columns; a missing cell is a
//! polars null.

use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BenchmarkError, BenchmarkResult};

/// A single cell value.
///
/// `Null` is the explicit missing marker: result tables use it for cells a
/// metric failed to fill, and it renders as an empty CSV field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the cell (`Bool` counts as 0/1)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Scalar::Null | Scalar::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value into a cell.
    ///
    /// Arrays are flattened into a comma-separated string and objects are
    /// kept as their compact JSON text, since cells are scalar.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Array(items) => Scalar::Text(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Value::Object(_) => Scalar::Text(value.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<AnyValue<'_>> for Scalar {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Scalar::Null,
            AnyValue::Boolean(b) => Scalar::Bool(b),
            AnyValue::Int32(v) => Scalar::Int(v.into()),
            AnyValue::Int64(v) => Scalar::Int(v),
            AnyValue::UInt32(v) => Scalar::Int(v.into()),
            AnyValue::UInt64(v) => i64::try_from(v)
                .map(Scalar::Int)
                .unwrap_or(Scalar::Float(v as f64)),
            AnyValue::Float32(v) => Scalar::Float(v.into()),
            AnyValue::Float64(v) => Scalar::Float(v),
            AnyValue::Utf8(s) => Scalar::Text(s.to_string()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// One row under construction, keyed by column name in insertion order.
///
/// Used to assemble heterogeneous records before they are unified into a
/// [`Table`] with [`Table::from_records`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Scalar)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell. Re-setting an existing column overwrites it in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Build one typed column from its cells.
///
/// Any text makes the column Utf8; otherwise floats (or ints mixed with
/// bools) give Float64, ints give Int64, bools give Boolean. A column with
/// no values at all is Utf8 nulls.
fn column_series(name: &str, cells: &[Scalar]) -> Series {
    let (mut text, mut float, mut int, mut boolean) = (false, false, false, false);
    for cell in cells {
        match cell {
            Scalar::Null => {}
            Scalar::Bool(_) => boolean = true,
            Scalar::Int(_) => int = true,
            Scalar::Float(_) => float = true,
            Scalar::Text(_) => text = true,
        }
    }

    if text || !(float || int || boolean) {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| (!cell.is_null()).then(|| cell.to_string()))
            .collect();
        Series::new(name, values)
    } else if float || (int && boolean) {
        let values: Vec<Option<f64>> = cells.iter().map(Scalar::as_f64).collect();
        Series::new(name, values)
    } else if int {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| match cell {
                Scalar::Int(v) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Scalar::Bool(v) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    }
}

/// Ordered rows sharing one set of named columns
#[derive(Debug, Clone, Default)]
pub struct Table {
    frame: DataFrame,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> BenchmarkResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_rows(columns, Vec::new())
    }

    /// Build a table from pre-shaped rows, rejecting any row of the wrong width
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Scalar>>) -> BenchmarkResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(BenchmarkError::InvalidTable {
                reason: format!(
                    "row has {} cells but table has {} columns",
                    row.len(),
                    columns.len()
                ),
            });
        }

        let series: Vec<Series> = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells: Vec<Scalar> = rows
                    .iter()
                    .map(|row| row.get(idx).cloned().unwrap_or_default())
                    .collect();
                column_series(name, &cells)
            })
            .collect();
        Ok(Self {
            frame: DataFrame::new(series)?,
        })
    }

    /// Unify heterogeneous rows into one table.
    ///
    /// Columns appear in first-seen order across all rows; cells a row does
    /// not mention are null.
    pub fn from_records(records: Vec<Row>) -> BenchmarkResult<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for (name, _) in record.iter() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        Self::from_records_with_columns(columns, records)
    }

    /// Lay rows out under a fixed column list, filling absent cells with null.
    ///
    /// A row naming a column outside the list is rejected.
    pub fn from_records_with_columns(
        columns: Vec<String>,
        records: Vec<Row>,
    ) -> BenchmarkResult<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let outside = record
                .iter()
                .find(|(name, _)| !columns.iter().any(|c| c == name));
            if let Some((name, _)) = outside {
                return Err(BenchmarkError::InvalidTable {
                    reason: format!("row has column '{name}' outside the table columns"),
                });
            }
            rows.push(
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or_default())
                    .collect(),
            );
        }
        Self::from_rows(columns, rows)
    }

    /// Build a table from a JSON array of objects.
    pub fn from_json(value: &Value) -> BenchmarkResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| BenchmarkError::process("expected a JSON array of records"))?;

        let mut records = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                BenchmarkError::process(format!("record {idx} is not a JSON object"))
            })?;
            let mut row = Row::new();
            for (key, value) in object {
                row.set(key.clone(), Scalar::from_json(value));
            }
            records.push(row);
        }
        Self::from_records(records)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> Vec<&str> {
        self.frame.get_column_names()
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<Scalar> {
        let series = self.frame.column(column).ok()?;
        series.get(row).ok().map(Scalar::from)
    }

    /// Column cast to Float64, if its dtype is numeric or boolean
    fn numeric(&self, name: &str) -> Option<Series> {
        let series = self.frame.column(name).ok()?;
        let dtype = series.dtype();
        if dtype.is_numeric() || matches!(dtype, DataType::Boolean) {
            series.cast(&DataType::Float64).ok()
        } else {
            None
        }
    }

    /// Mean of a numeric column, skipping nulls.
    ///
    /// `None` if the column is absent or holds no numeric value.
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.numeric(name)?.mean()
    }

    /// Sum of a numeric column (0.0 for a column with no numeric values)
    pub fn sum(&self, name: &str) -> Option<f64> {
        if !self.has_column(name) {
            return None;
        }
        let total = self
            .numeric(name)
            .and_then(|series| series.f64().ok().and_then(|ca| ca.sum()));
        Some(total.unwrap_or(0.0))
    }

    /// Number of distinct non-null values in a column
    pub fn n_unique(&self, name: &str) -> Option<usize> {
        let series = self.frame.column(name).ok()?;
        series.drop_nulls().n_unique().ok()
    }

    /// Append all rows of `other`, which must have identical columns
    pub fn append(&mut self, other: Table) -> BenchmarkResult<()> {
        if self.columns() != other.columns() {
            return Err(BenchmarkError::InvalidTable {
                reason: format!(
                    "cannot append table with columns {:?} to table with columns {:?}",
                    other.columns(),
                    self.columns()
                ),
            });
        }
        self.frame.vstack_mut(&other.frame)?;
        Ok(())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        let columns = self.columns();
        columns == other.columns()
            && self.height() == other.height()
            && columns
                .iter()
                .all(|c| (0..self.height()).all(|row| self.get(row, c) == other.get(row, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(
            ["text", "label", "length"],
            vec![
                vec!["sample text 1".into(), Scalar::Int(0), Scalar::Int(12)],
                vec!["sample text 2".into(), Scalar::Int(1), Scalar::Int(13)],
                vec!["sample text 3".into(), Scalar::Int(0), Scalar::Int(12)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_rejects_wrong_width() {
        let err = Table::from_rows(["a", "b"], vec![vec![Scalar::Int(1)]]).unwrap_err();
        assert!(matches!(err, BenchmarkError::InvalidTable { .. }));
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        let err = Table::new(["a", "a"]).unwrap_err();
        assert!(matches!(err, BenchmarkError::InvalidTable { .. }));
    }

    #[test]
    fn test_aggregates() {
        let table = sample();
        assert_eq!(table.height(), 3);
        assert_eq!(table.n_unique("label"), Some(2));
        assert_eq!(table.sum("length"), Some(37.0));
        let mean = table.mean("length").unwrap();
        assert!((mean - 37.0 / 3.0).abs() < 1e-9);
        assert_eq!(table.mean("missing"), None);
        assert_eq!(table.mean("text"), None);
        assert_eq!(table.sum("text"), Some(0.0));
        assert_eq!(table.sum("missing"), None);
    }

    #[test]
    fn test_int_and_float_share_a_column_and_nulls_are_skipped() {
        let table = Table::from_rows(
            ["label"],
            vec![
                vec![Scalar::Int(1)],
                vec![Scalar::Float(1.0)],
                vec![Scalar::Null],
                vec![Scalar::Int(2)],
            ],
        )
        .unwrap();
        assert_eq!(table.frame().column("label").unwrap().dtype(), &DataType::Float64);
        assert_eq!(table.n_unique("label"), Some(2));
        assert_eq!(table.get(0, "label"), Some(Scalar::Float(1.0)));
        assert_eq!(table.get(2, "label"), Some(Scalar::Null));
        assert_eq!(table.sum("label"), Some(4.0));
    }

    #[test]
    fn test_all_null_column_is_not_numeric() {
        let table = Table::from_rows(["x"], vec![vec![Scalar::Null], vec![Scalar::Null]]).unwrap();
        assert_eq!(table.mean("x"), None);
        assert_eq!(table.sum("x"), Some(0.0));
        assert_eq!(table.n_unique("x"), Some(0));
    }

    #[test]
    fn test_from_records_unions_columns_in_first_seen_order() {
        let table = Table::from_records(vec![
            Row::new().with("name", "a").with("x", 1_i64),
            Row::new().with("name", "b").with("y", 2.5),
        ])
        .unwrap();
        assert_eq!(table.columns(), ["name", "x", "y"]);
        assert_eq!(table.get(0, "y"), Some(Scalar::Null));
        assert_eq!(table.get(1, "x"), Some(Scalar::Null));
        assert_eq!(table.get(1, "y"), Some(Scalar::Float(2.5)));
    }

    #[test]
    fn test_from_records_with_columns_keeps_given_order() {
        let columns = vec!["name".to_string(), "url".to_string(), "score".to_string()];
        let table = Table::from_records_with_columns(
            columns,
            vec![
                Row::new().with("name", "a").with("score", 1.0),
                Row::new().with("name", "b").with("url", "http://x").with("score", 2.0),
            ],
        )
        .unwrap();
        assert_eq!(table.columns(), ["name", "url", "score"]);
        assert_eq!(table.get(0, "url"), Some(Scalar::Null));
        assert_eq!(table.get(1, "url"), Some(Scalar::from("http://x")));

        let err = Table::from_records_with_columns(
            vec!["name".to_string()],
            vec![Row::new().with("name", "a").with("extra", 1_i64)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_row_set_overwrites_in_place() {
        let mut row = Row::new().with("a", 1_i64).with("b", 2_i64);
        row.set("a", 9_i64);
        let cells: Vec<_> = row.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        assert_eq!(
            cells,
            vec![
                ("a".to_string(), Scalar::Int(9)),
                ("b".to_string(), Scalar::Int(2))
            ]
        );
    }

    #[test]
    fn test_from_json_array_of_objects() {
        let raw = json!([
            {"text": "hello", "label": 0, "length": 5, "tags": ["qa", "mcq"]},
            {"text": "hi", "label": 1, "length": 2}
        ]);
        let table = Table::from_json(&raw).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.get(0, "tags"), Some(Scalar::Text("qa, mcq".into())));
        assert_eq!(table.get(1, "tags"), Some(Scalar::Null));
        assert_eq!(table.get(1, "label"), Some(Scalar::Int(1)));

        assert!(Table::from_json(&json!({"not": "an array"})).is_err());
        assert!(Table::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_append_requires_same_schema() {
        let mut table = sample();
        let extra = Table::from_rows(
            ["text", "label", "length"],
            vec![vec!["four".into(), Scalar::Int(2), Scalar::Int(4)]],
        )
        .unwrap();
        table.append(extra).unwrap();
        assert_eq!(table.height(), 4);
        assert_eq!(table.n_unique("label"), Some(3));

        let other = Table::new(["different"]).unwrap();
        assert!(table.append(other).is_err());
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Null.to_string(), "");
        assert_eq!(Scalar::Float(3.0).to_string(), "3.0");
        assert_eq!(Scalar::Float(2.5).to_string(), "2.5");
        assert_eq!(Scalar::Int(7).to_string(), "7");
        assert_eq!(Scalar::from(None::<f64>), Scalar::Null);
    }
}
