use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::error::SchemaError;

/// A single value read from an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// NaN numbers and blank text count as missing, the same as an empty cell.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(n) => n.is_nan(),
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Boolean(b) => write!(f, "{}", b),
            Cell::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Column type as declared by the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Integer,
    Float,
    Boolean,
    Text,
    Timestamp,
    Mixed,
}

impl SourceType {
    pub fn is_numeric(self) -> bool {
        matches!(self, SourceType::Integer | SourceType::Float)
    }

    /// Derives a declared type from the cells themselves, for sources that
    /// type each cell rather than each column.
    pub fn infer(cells: &[Cell]) -> Self {
        let mut inferred: Option<SourceType> = None;
        for cell in cells.iter().filter(|c| !c.is_missing()) {
            let this = match cell {
                Cell::Number(n) if n.fract() == 0.0 => SourceType::Integer,
                Cell::Number(_) => SourceType::Float,
                Cell::Boolean(_) => SourceType::Boolean,
                Cell::Text(_) => SourceType::Text,
                Cell::Timestamp(_) => SourceType::Timestamp,
                Cell::Missing => continue,
            };
            inferred = match (inferred, this) {
                (None, t) => Some(t),
                (Some(a), b) if a == b => Some(a),
                (Some(a), b) if a.is_numeric() && b.is_numeric() => Some(SourceType::Float),
                _ => return SourceType::Mixed,
            };
        }
        inferred.unwrap_or(SourceType::Text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub source_type: SourceType,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let source_type = SourceType::infer(&cells);
        Self {
            name: name.into(),
            source_type,
            cells,
        }
    }

    pub fn with_type(name: impl Into<String>, source_type: SourceType, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            source_type,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }
}

/// A rectangular table: every column holds the same number of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(SchemaError::RowCountMismatch {
                    column: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// First `limit` rows rendered as strings, for display.
    pub fn preview(&self, limit: usize) -> Vec<Vec<String>> {
        (0..self.row_count().min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.cells[row].to_string())
                    .collect()
            })
            .collect()
    }
}
