use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::summary::*;
use super::types::*;
use super::utils::{normalize_headers, parse_timestamp};
use crate::error::ProfileError;
use crate::models::{Cell, Column, Dataset, SourceType};

/// Decides the kind of a column from its declared type and its values.
pub fn classify_column(column: &Column) -> ColumnKind {
    match column.source_type {
        SourceType::Integer | SourceType::Float => return ColumnKind::Numeric,
        SourceType::Timestamp => return ColumnKind::Temporal,
        _ => {}
    }

    let present: Vec<&Cell> = column.cells.iter().filter(|c| !c.is_missing()).collect();
    if present.is_empty() {
        return ColumnKind::Unknown;
    }

    if present.iter().all(|c| matches!(c, Cell::Text(_))) {
        // all-or-nothing: one unparseable value keeps the column categorical
        let all_dates = present.iter().all(|c| match c {
            Cell::Text(s) => parse_timestamp(s).is_some(),
            _ => false,
        });
        return if all_dates {
            ColumnKind::Temporal
        } else {
            ColumnKind::Categorical
        };
    }

    if present.iter().all(|c| matches!(c, Cell::Boolean(_))) {
        return ColumnKind::Categorical;
    }
    if present.iter().all(|c| matches!(c, Cell::Number(_))) {
        return ColumnKind::Numeric;
    }
    if present.iter().all(|c| matches!(c, Cell::Timestamp(_))) {
        return ColumnKind::Temporal;
    }

    ColumnKind::Unknown
}

pub struct Profiler {
    pub top_n: usize,
}

impl Default for Profiler {
    fn default() -> Self {
        Self { top_n: DEFAULT_TOP_N }
    }
}

impl Profiler {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn profile_dataset(&self, dataset: &Dataset) -> Result<DatasetProfile, ProfileError> {
        let start = std::time::Instant::now();
        if dataset.column_count() == 0 {
            return Err(ProfileError::EmptyDataset);
        }

        let identifiers = normalize_headers(&dataset.headers())?;
        info!(
            "Profiling dataset: {} rows x {} columns",
            dataset.row_count(),
            dataset.column_count()
        );

        let columns = dataset
            .columns()
            .iter()
            .zip(identifiers)
            .map(|(column, identifier)| self.profile_column(column, identifier))
            .collect::<Result<Vec<_>, _>>()?;

        let trend = build_trend(dataset, &columns);

        info!("Profiling completed in {:?}", start.elapsed());
        Ok(DatasetProfile {
            row_count: dataset.row_count(),
            column_count: dataset.column_count(),
            columns,
            trend,
        })
    }

    fn profile_column(&self, column: &Column, identifier: ColumnIdentifier) -> Result<ColumnProfile, ProfileError> {
        let kind = classify_column(column);
        debug!("Column {} ({:?}) classified as {:?}", identifier, column.source_type, kind);

        let summary = match kind {
            ColumnKind::Numeric => Some(ColumnSummary::Numeric(summarize_numeric(&column.cells))),
            ColumnKind::Categorical => Some(ColumnSummary::Categorical(summarize_categorical(
                &column.cells,
                self.top_n,
            ))),
            ColumnKind::Temporal => Some(ColumnSummary::Temporal(summarize_temporal(
                identifier.as_str(),
                &column.cells,
            )?)),
            ColumnKind::Unknown => {
                warn!("Column {} could not be classified, skipping summary", identifier);
                None
            }
        };

        let sample_values: SmallVec<[String; SAMPLE_SIZE]> = column
            .cells
            .iter()
            .take(SAMPLE_SIZE)
            .map(|c| c.to_string())
            .collect();

        Ok(ColumnProfile {
            identifier,
            name: column.name.clone(),
            source_type: column.source_type,
            kind,
            missing_count: column.missing_count(),
            sample_values,
            summary,
            chart: chart_for(kind),
        })
    }
}

/// Pairs the first temporal column with the first numeric column.
fn build_trend(dataset: &Dataset, profiles: &[ColumnProfile]) -> Option<TrendSeries> {
    let date_idx = profiles.iter().position(|p| p.kind == ColumnKind::Temporal)?;
    let value_idx = profiles.iter().position(|p| p.kind == ColumnKind::Numeric)?;
    let columns = dataset.columns();

    Some(TrendSeries {
        date_column: profiles[date_idx].identifier.clone(),
        value_column: profiles[value_idx].identifier.clone(),
        points: daily_mean(&columns[date_idx].cells, &columns[value_idx].cells),
    })
}

/// Profiles `dataset` with the default top-N.
pub fn profile_dataset(dataset: &Dataset) -> Result<DatasetProfile, ProfileError> {
    Profiler::default().profile_dataset(dataset)
}
