use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::types::ColumnIdentifier;
use crate::error::SchemaError;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

// Month-first is tried before day-first, so "03/04/2024" is March 4th.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

pub fn normalize_header(raw: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&raw.trim().to_lowercase(), "_")
        .into_owned()
}

/// Normalizes every header, refusing to let two headers share an identifier.
pub fn normalize_headers<S: AsRef<str>>(raw_headers: &[S]) -> Result<Vec<ColumnIdentifier>, SchemaError> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(raw_headers.len());
    let mut identifiers = Vec::with_capacity(raw_headers.len());

    for (idx, raw) in raw_headers.iter().enumerate() {
        let normalized = normalize_header(raw.as_ref());
        if let Some(&first) = seen.get(&normalized) {
            return Err(SchemaError::DuplicateColumn {
                identifier: normalized,
                first: raw_headers[first].as_ref().to_string(),
                second: raw.as_ref().to_string(),
            });
        }
        seen.insert(normalized.clone(), idx);
        identifiers.push(ColumnIdentifier::new_unchecked(normalized));
    }

    Ok(identifiers)
}

fn four_digit_year(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    (1000..=9999).contains(&ts.year()).then_some(ts)
}

/// Best-effort parse over a fixed format list. `%Y` accepts any digit count,
/// so a candidate only counts with a four-digit year ("1.2.3" is not a date).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(dt) = DateTime::parse_from_rfc3339(s)
        .ok()
        .and_then(|dt| four_digit_year(dt.naive_utc()))
    {
        return Some(dt);
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| {
            NaiveDateTime::parse_from_str(s, format)
                .ok()
                .and_then(four_digit_year)
        })
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(s, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .and_then(four_digit_year)
            })
        })
}

/// Percentile of an ascending slice with linear interpolation between ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Table names become lowercase identifiers safe to splice into SQL.
pub fn clean_table_name(name: &str) -> String {
    let cleaned = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>()
        .to_lowercase();

    if cleaned.chars().next().map_or(true, |c| !c.is_ascii_alphabetic()) {
        format!("tbl_{}", cleaned)
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idents(raw: &[&str]) -> Vec<String> {
        normalize_headers(raw)
            .unwrap()
            .into_iter()
            .map(|i| i.as_str().to_string())
            .collect()
    }

    #[test]
    fn normalizes_trim_case_and_whitespace_runs() {
        assert_eq!(
            idents(&["  Order   Date ", "Unit\tPrice", "ÉTAT", "", "a-b.c"]),
            vec!["order_date", "unit_price", "état", "", "a-b.c"]
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = idents(&["Customer Name", " Total  Sales\n", "Région"]);
        let twice = idents(&once.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(once, twice);
    }

    #[test]
    fn colliding_headers_are_a_schema_error() {
        let err = normalize_headers(&["Order Date", "qty", "order_date"]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateColumn {
                identifier: "order_date".into(),
                first: "Order Date".into(),
                second: "order_date".into(),
            }
        );
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(parse_timestamp("2024-01-03").map(|t| t.date()), Some(day(2024, 1, 3)));
        assert_eq!(parse_timestamp("2024/01/03").map(|t| t.date()), Some(day(2024, 1, 3)));
        assert_eq!(parse_timestamp("03/04/2024").map(|t| t.date()), Some(day(2024, 3, 4)));
        assert_eq!(parse_timestamp("25/12/2023").map(|t| t.date()), Some(day(2023, 12, 25)));
        assert_eq!(parse_timestamp("5 Jan 2024").map(|t| t.date()), Some(day(2024, 1, 5)));
        assert_eq!(
            parse_timestamp("2024-01-03 14:05:00"),
            day(2024, 1, 3).and_hms_opt(14, 5, 0)
        );
        assert_eq!(
            parse_timestamp("2024-01-03T14:05:00+02:00"),
            day(2024, 1, 3).and_hms_opt(12, 5, 0)
        );
    }

    #[test]
    fn day_first_and_month_first_accept_the_same_time_shapes() {
        let christmas = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        assert_eq!(parse_timestamp("25/12/2023 10:00"), christmas.and_hms_opt(10, 0, 0));
        assert_eq!(parse_timestamp("25/12/2023 10:00:30"), christmas.and_hms_opt(10, 0, 30));
        assert_eq!(parse_timestamp("12/25/2023 10:00"), christmas.and_hms_opt(10, 0, 0));
        assert_eq!(parse_timestamp("2023/12/25 10:00"), christmas.and_hms_opt(10, 0, 0));
    }

    #[test]
    fn rejects_non_dates() {
        for s in ["", "hello", "2024-13-01", "12345", "1.5", "N/A", "1/2/3", "1.2.3", "1.1.10", "0001-02-03"] {
            assert_eq!(parse_timestamp(s), None, "{s:?} should not parse");
        }
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 0.25), Some(1.75));
        assert_eq!(percentile(&v, 0.5), Some(2.5));
        assert_eq!(percentile(&v, 1.0), Some(4.0));
        assert_eq!(percentile(&[7.0], 0.75), Some(7.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn cleans_table_names() {
        assert_eq!(clean_table_name("Sales 2024"), "sales_2024");
        assert_eq!(clean_table_name("2024 sales"), "tbl_2024_sales");
        assert_eq!(clean_table_name("drop;table"), "drop_table");
    }
}
