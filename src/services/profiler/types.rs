use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

use crate::models::SourceType;

pub const SAMPLE_SIZE: usize = 3;
pub const DEFAULT_TOP_N: usize = 5;

/// Normalized column key: trimmed, lower-cased, whitespace runs collapsed to `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColumnIdentifier(String);

impl ColumnIdentifier {
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Temporal,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoricalSummary {
    pub top: Vec<ValueCount>,
    pub distinct_count: usize,
    pub missing_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemporalSummary {
    pub min: Option<NaiveDateTime>,
    pub max: Option<NaiveDateTime>,
    pub missing_count: usize,
    /// One entry per calendar day from `min` to `max`, zero-filled.
    pub daily: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Temporal(TemporalSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartRecommendation {
    HistogramWithDensity,
    Bar,
    TimeSeriesLine,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub identifier: ColumnIdentifier,
    pub name: String,
    pub source_type: SourceType,
    pub kind: ColumnKind,
    pub missing_count: usize,
    pub sample_values: SmallVec<[String; SAMPLE_SIZE]>,
    pub summary: Option<ColumnSummary>,
    pub chart: ChartRecommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub mean: f64,
}

/// Per-day mean of a numeric column keyed by a temporal column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub date_column: ColumnIdentifier,
    pub value_column: ColumnIdentifier,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
    pub trend: Option<TrendSeries>,
}
