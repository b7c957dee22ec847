use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

use super::types::*;
use super::utils::{parse_timestamp, percentile};
use crate::error::ProfileError;
use crate::models::Cell;

pub fn summarize_numeric(values: &[Cell]) -> NumericSummary {
    let mut nums: Vec<f64> = values
        .iter()
        .filter_map(|v| match v {
            Cell::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        })
        .collect();
    nums.sort_by(f64::total_cmp);

    let count = nums.len();
    if count == 0 {
        return NumericSummary {
            count,
            mean: None,
            std_dev: None,
            min: None,
            q25: None,
            median: None,
            q75: None,
            max: None,
        };
    }

    let mean = nums.iter().sum::<f64>() / count as f64;
    let std_dev = (count >= 2).then(|| {
        let ss: f64 = nums.iter().map(|x| (x - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    NumericSummary {
        count,
        mean: Some(mean),
        std_dev,
        min: nums.first().copied(),
        q25: percentile(&nums, 0.25),
        median: percentile(&nums, 0.5),
        q75: percentile(&nums, 0.75),
        max: nums.last().copied(),
    }
}

fn category_label(cell: &Cell) -> Option<String> {
    match cell {
        _ if cell.is_missing() => None,
        Cell::Text(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Frequency table sorted by count, ties kept in first-seen order.
pub fn summarize_categorical(values: &[Cell], top_n: usize) -> CategoricalSummary {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    let mut missing_count = 0;

    for value in values {
        let Some(label) = category_label(value) else {
            missing_count += 1;
            continue;
        };
        match index.get(&label) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(label.clone(), counts.len());
                counts.push(ValueCount { value: label, count: 1 });
            }
        }
    }

    let distinct_count = counts.len();
    // stable sort
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(top_n);

    CategoricalSummary {
        top: counts,
        distinct_count,
        missing_count,
    }
}

pub(crate) fn cell_timestamp(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::Timestamp(ts) => Some(*ts),
        Cell::Text(s) => parse_timestamp(s),
        _ => None,
    }
}

pub fn summarize_temporal(column: &str, values: &[Cell]) -> Result<TemporalSummary, ProfileError> {
    let mut missing_count = 0;
    let mut stamps = Vec::with_capacity(values.len());

    for value in values {
        if value.is_missing() {
            missing_count += 1;
            continue;
        }
        let ts = cell_timestamp(value).ok_or_else(|| ProfileError::Inconsistent {
            column: column.to_string(),
            detail: format!("value {:?} is not a timestamp", value.to_string()),
        })?;
        stamps.push(ts);
    }

    let (Some(min), Some(max)) = (stamps.iter().min().copied(), stamps.iter().max().copied()) else {
        return Ok(TemporalSummary {
            min: None,
            max: None,
            missing_count,
            daily: Vec::new(),
        });
    };

    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for ts in &stamps {
        *per_day.entry(ts.date()).or_default() += 1;
    }

    let daily = min
        .date()
        .iter_days()
        .take_while(|day| *day <= max.date())
        .map(|day| DailyCount {
            day,
            count: per_day.get(&day).copied().unwrap_or(0),
        })
        .collect();

    Ok(TemporalSummary {
        min: Some(min),
        max: Some(max),
        missing_count,
        daily,
    })
}

pub fn recommend_chart(profile: &ColumnProfile) -> ChartRecommendation {
    chart_for(profile.kind)
}

pub(crate) fn chart_for(kind: ColumnKind) -> ChartRecommendation {
    match kind {
        ColumnKind::Numeric => ChartRecommendation::HistogramWithDensity,
        ColumnKind::Categorical => ChartRecommendation::Bar,
        ColumnKind::Temporal => ChartRecommendation::TimeSeriesLine,
        ColumnKind::Unknown => ChartRecommendation::None,
    }
}

/// Per-day mean of `values`, keyed by the day of the matching `dates` cell.
/// Rows missing either side are skipped; days without rows are absent.
pub fn daily_mean(dates: &[Cell], values: &[Cell]) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in dates.iter().zip(values) {
        let (Some(ts), Cell::Number(n)) = (cell_timestamp(date), value) else {
            continue;
        };
        if n.is_nan() {
            continue;
        }
        let bucket = buckets.entry(ts.date()).or_insert((0.0, 0));
        bucket.0 += n;
        bucket.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(day, (sum, n))| TrendPoint {
            day,
            mean: sum / n as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(v: &[f64]) -> Vec<Cell> {
        v.iter().map(|n| Cell::Number(*n)).collect()
    }

    fn texts(v: &[&str]) -> Vec<Cell> {
        v.iter().map(|s| Cell::Text(s.to_string())).collect()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn numeric_summary_of_one_to_five() {
        let s = summarize_numeric(&nums(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(s.count, 5);
        assert_eq!(s.mean, Some(3.0));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.q25, Some(2.0));
        assert_eq!(s.median, Some(3.0));
        assert_eq!(s.q75, Some(4.0));
        assert_eq!(s.max, Some(5.0));
        let sd = s.std_dev.unwrap();
        assert!((sd - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn numeric_summary_skips_missing() {
        let mut cells = nums(&[10.0, f64::NAN, 30.0]);
        cells.push(Cell::Missing);
        let s = summarize_numeric(&cells);
        assert_eq!(s.count, 2);
        assert_eq!(s.mean, Some(20.0));
        assert_eq!(s.median, Some(20.0));
    }

    #[test]
    fn single_value_has_no_std_dev() {
        let s = summarize_numeric(&nums(&[42.0]));
        assert_eq!(s.count, 1);
        assert_eq!(s.std_dev, None);
        assert_eq!(s.min, Some(42.0));
        assert_eq!(s.max, Some(42.0));
    }

    #[test]
    fn all_missing_numeric_is_all_none() {
        let s = summarize_numeric(&[Cell::Missing, Cell::Missing]);
        assert_eq!(s.count, 0);
        assert!(s.mean.is_none() && s.std_dev.is_none() && s.min.is_none());
        assert!(s.q25.is_none() && s.median.is_none() && s.q75.is_none() && s.max.is_none());
    }

    #[test]
    fn categorical_top_n_with_distinct_count() {
        let s = summarize_categorical(&texts(&["a", "b", "a", "c", "a", "b"]), 2);
        assert_eq!(
            s.top,
            vec![
                ValueCount { value: "a".into(), count: 3 },
                ValueCount { value: "b".into(), count: 2 },
            ]
        );
        assert_eq!(s.distinct_count, 3);
        assert_eq!(s.missing_count, 0);
    }

    #[test]
    fn categorical_ties_keep_first_seen_order() {
        let mut cells = texts(&["z", "y", "x", "y", "z", "x"]);
        cells.push(Cell::Missing);
        cells.push(Cell::Text("".into()));
        let s = summarize_categorical(&cells, 5);
        let order: Vec<&str> = s.top.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(order, vec!["z", "y", "x"]);
        assert_eq!(s.missing_count, 2);
    }

    #[test]
    fn booleans_are_counted_as_labels() {
        let cells = vec![Cell::Boolean(true), Cell::Boolean(false), Cell::Boolean(true)];
        let s = summarize_categorical(&cells, 5);
        assert_eq!(s.top[0], ValueCount { value: "true".into(), count: 2 });
        assert_eq!(s.top[1], ValueCount { value: "false".into(), count: 1 });
    }

    #[test]
    fn daily_series_zero_fills_gaps() {
        let s = summarize_temporal("d", &texts(&["2024-01-01", "2024-01-03", "2024-01-03 18:30:00"])).unwrap();
        assert_eq!(s.min, day(2024, 1, 1).and_hms_opt(0, 0, 0));
        assert_eq!(s.max, day(2024, 1, 3).and_hms_opt(18, 30, 0));
        assert_eq!(
            s.daily,
            vec![
                DailyCount { day: day(2024, 1, 1), count: 1 },
                DailyCount { day: day(2024, 1, 2), count: 0 },
                DailyCount { day: day(2024, 1, 3), count: 2 },
            ]
        );
    }

    #[test]
    fn temporal_parse_failure_is_an_inconsistency() {
        let err = summarize_temporal("d", &texts(&["2024-01-01", "soon"])).unwrap_err();
        assert!(matches!(err, ProfileError::Inconsistent { ref column, .. } if column == "d"));
    }

    #[test]
    fn temporal_all_missing_is_empty() {
        let s = summarize_temporal("d", &[Cell::Missing]).unwrap();
        assert_eq!(s.min, None);
        assert!(s.daily.is_empty());
        assert_eq!(s.missing_count, 1);
    }

    #[test]
    fn daily_mean_groups_by_day() {
        let dates = texts(&["2024-01-02", "2024-01-01", "2024-01-02", "", "2024-01-05"]);
        let values = vec![
            Cell::Number(4.0),
            Cell::Number(1.0),
            Cell::Number(6.0),
            Cell::Number(100.0),
            Cell::Missing,
        ];
        let points = daily_mean(&dates, &values);
        assert_eq!(
            points,
            vec![
                TrendPoint { day: day(2024, 1, 1), mean: 1.0 },
                TrendPoint { day: day(2024, 1, 2), mean: 5.0 },
            ]
        );
    }
}
