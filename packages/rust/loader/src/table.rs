//! In-memory CSV table with per-column type inference.
//!
//! The first record is the header. Each column is typed from its content:
//! - `Integer` if every non-empty value parses as `i64`
//! - `Float` if every non-empty value parses as `f64`
//! - `Text` otherwise (including all-empty columns)
//!
//! Empty fields become [`Value::Null`].

use std::fmt;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use olist_shared::{OlistError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// A single parsed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A named, typed column.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    kind: ColumnType,
    values: Vec<Value>,
}

impl Column {
    /// Build a column from raw string fields, inferring its type.
    pub fn from_raw(name: impl Into<String>, raw: Vec<String>) -> Self {
        let kind = infer_type(&raw);
        let values = raw
            .into_iter()
            .map(|field| convert(field, kind))
            .collect();
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at `row`, or `Null` past the end.
    pub fn get(&self, row: usize) -> &Value {
        self.values.get(row).unwrap_or(&Value::Null)
    }
}

/// A parsed CSV file: ordered columns of equal length.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: usize,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl Table {
    /// Parse a CSV file from disk.
    pub fn from_path(name: impl Into<String>, path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| OlistError::file_access(path, e))?;
        Self::from_reader(name, file).map_err(|e| match e {
            OlistError::Parse { message } => {
                OlistError::parse(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse CSV content from any reader. The first record is the header.
    pub fn from_reader(name: impl Into<String>, reader: impl Read) -> Result<Self> {
        let name = name.into();
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| OlistError::parse(format!("failed to read headers of '{name}': {e}")))?
            .clone();

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut rows = 0;

        for result in reader.records() {
            let record = result.map_err(|e| {
                OlistError::parse(format!("table '{name}' row {}: {e}", rows + 1))
            })?;
            for (slot, field) in raw.iter_mut().zip(record.iter()) {
                slot.push(field.to_string());
            }
            rows += 1;
        }

        let columns = headers
            .iter()
            .zip(raw)
            .map(|(header, fields)| Column::from_raw(header.trim(), fields))
            .collect();

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a column by header name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| OlistError::schema_mismatch(&self.name, name))
    }
}

fn infer_type(raw: &[String]) -> ColumnType {
    let mut present = raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).peekable();
    if present.peek().is_none() {
        return ColumnType::Text;
    }

    let mut kind = ColumnType::Integer;
    for field in present {
        if kind == ColumnType::Integer && field.parse::<i64>().is_err() {
            kind = ColumnType::Float;
        }
        if kind == ColumnType::Float && field.parse::<f64>().is_err() {
            return ColumnType::Text;
        }
    }
    kind
}

fn convert(field: String, kind: ColumnType) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnType::Integer => trimmed.parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnType::Float => trimmed.parse().map(Value::Float).unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(field),
    }
}
