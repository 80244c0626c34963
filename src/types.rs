//! Type definitions for dataset values

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// Represents a single scalar value of a dataset row
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Null / missing value
    Empty,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// DateTime value (Excel serial date number)
    DateTime(f64),
}

impl CellValue {
    /// Convert cell value to its displayed text
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(d) => d.to_string(),
        }
    }

    /// Length of the displayed text in characters, used for column sizing
    pub fn char_len(&self) -> usize {
        match self {
            CellValue::Empty => 0,
            CellValue::String(s) => s.chars().count(),
            // 19 = "yyyy-mm-dd hh:mm:ss"
            CellValue::DateTime(_) => 19,
            other => other.as_string().len(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(excel_serial(dt))
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::DateTime(excel_serial(d.and_time(chrono::NaiveTime::MIN)))
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

/// Convert a timestamp to an Excel serial number (1900 date system)
///
/// 25569 is the serial of 1970-01-01; dates from 1900-03-01 on are exact.
pub fn excel_serial(dt: NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64 / 86_400_000.0 + 25569.0
}

/// One tabular dataset: identifier plus rows, first row is the header
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Identifier the dataset provider knows it by
    pub id: String,
    /// Header row followed by data rows
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Create a dataset from any rows of convertible values
    pub fn new<I, R, V>(id: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        Dataset {
            id: id.into(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Header row (empty slice when the dataset has no rows at all)
    pub fn header(&self) -> &[CellValue] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows after the header
    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Number of columns, as declared by the header
    pub fn column_count(&self) -> usize {
        self.header().len()
    }
}

/// Convert column index to Excel letter (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letter(col: u32) -> String {
    let mut result = String::new();
    let mut col = col + 1;

    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }

    result
}

/// Excel-style cell reference from 0-based row and column (e.g. "B3")
pub fn cell_reference(row: u32, col: u32) -> String {
    format!("{}{}", column_letter(col), row + 1)
}
