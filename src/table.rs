use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use encoding_rs::WINDOWS_1252;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Canonical date format used in every produced table.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single typed cell value.
///
/// Raw files come in as `Str` cells; the normalizer coerces them into the
/// typed variants. `Null` is an explicit absent value and survives CSV
/// round-trips as an empty field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell, coercing strings when they parse cleanly.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Str(s) => s.trim().replace(',', "").parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Cell content as read from a CSV field: empty fields are explicit nulls.
    pub fn from_field(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
            Value::Null
        } else {
            Value::Str(trimmed.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Null => Ok(()),
        }
    }
}

/// Total ordering across cell values so sorts are deterministic even for
/// mixed columns: nulls first, then dates, numbers, strings.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Date(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
        }
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (x, y) if rank(x) == 2 && rank(y) == 2 => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (x, y) => rank(x).cmp(&rank(y)),
    }
}

/// An ordered, schema'd sequence of rows. The unit every pipeline stage
/// consumes and produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table that still carries its schema. Stages degrade to this
    /// on missing sources so downstream consumers never see a headerless file.
    pub fn empty(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell lookup by column name; `Null` for unknown columns keeps callers
    /// total without panicking on schema drift.
    pub fn get<'a>(&'a self, row: &'a [Value], name: &str) -> &'a Value {
        self.column_index(name)
            .and_then(|i| row.get(i))
            .unwrap_or(&Value::Null)
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Stable sort by one column using the total value ordering.
    pub fn sort_by_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.rows.sort_by(|a, b| cmp_values(&a[idx], &b[idx]));
        }
    }

    /// Distinct non-null values of a column, first-encountered order.
    pub fn distinct(&self, name: &str) -> Vec<Value> {
        let mut seen: Vec<Value> = Vec::new();
        if let Some(idx) = self.column_index(name) {
            for row in &self.rows {
                let v = &row[idx];
                if !v.is_null() && !seen.contains(v) {
                    seen.push(v.clone());
                }
            }
        }
        seen
    }

    /// Parse CSV bytes into an all-`Str` table. UTF-8 (with or without BOM)
    /// first, Windows-1252 as the fallback for legacy exports.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table> {
        let stripped = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
        let text = match std::str::from_utf8(stripped) {
            Ok(s) => s.to_string(),
            Err(_) => WINDOWS_1252.decode(stripped).0.into_owned(),
        };
        Table::from_csv_str(&text)
    }

    pub fn from_csv_str(text: &str) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<Value> = record.iter().map(Value::from_field).collect();
            // Flexible parsing can yield short rows; pad to schema width.
            row.resize(columns.len(), Value::Null);
            row.truncate(columns.len());
            rows.push(row);
        }
        Ok(Table { columns, rows })
    }

    pub fn from_csv_path(path: &Path) -> Result<Table> {
        let bytes = fs::read(path)?;
        Table::from_csv_bytes(&bytes)
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writer.write_record(&fields)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write the table as CSV with a UTF-8 BOM so spreadsheet tools pick up
    /// non-ASCII text correctly.
    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = String::from("\u{feff}");
        out.push_str(&self.to_csv_string()?);
        fs::write(path, out)?;
        Ok(())
    }
}
