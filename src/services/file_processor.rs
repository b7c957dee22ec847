use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use polars::prelude::*;
use reqwest::Client;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use crate::error::{FileError, SchemaError};
use crate::models::{Cell, Column, Dataset, SourceType};
use crate::services::profiler::{parse_timestamp, utils::normalize_header};

const SCHEMA_INFERENCE_ROWS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, FileError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xlsm" => Ok(FileFormat::Xlsx),
            _ => Err(FileError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

/// Reads an uploaded file into a typed [`Dataset`], picking the reader by extension.
pub fn load_dataset(file_name: &str, file_data: &[u8]) -> Result<Dataset, FileError> {
    let start = std::time::Instant::now();
    let format = FileFormat::from_file_name(file_name)?;
    if file_data.iter().all(u8::is_ascii_whitespace) {
        return Err(FileError::Empty);
    }

    tracing::info!("Reading {} ({:?}, {}KB)", file_name, format, file_data.len() / 1024);
    let dataset = match format {
        FileFormat::Csv => read_csv(file_data)?,
        FileFormat::Xlsx => read_xlsx(file_data)?,
    };
    tracing::info!(
        "Read {} rows x {} columns in {:?}",
        dataset.row_count(),
        dataset.column_count(),
        start.elapsed()
    );
    Ok(dataset)
}

fn read_csv(file_data: &[u8]) -> Result<Dataset, FileError> {
    // polars renames a repeated header to `<name>_duplicated_<n>`, so the
    // header row is read raw and checked before the real parse
    let headers = read_csv_headers(file_data)?;
    reject_repeated_headers(&headers)?;

    let df = CsvReader::new(Cursor::new(file_data.to_vec()))
        .has_header(true)
        .infer_schema(Some(SCHEMA_INFERENCE_ROWS))
        .finish()
        .map_err(|e| {
            tracing::error!("Failed to parse CSV: {}", e);
            FileError::Csv(e)
        })?;

    let mut columns = df
        .get_columns()
        .iter()
        .map(series_to_column)
        .collect::<Result<Vec<_>, _>>()?;
    if columns.len() == headers.len() {
        for (column, header) in columns.iter_mut().zip(headers) {
            column.name = header;
        }
    }

    Ok(Dataset::new(columns)?)
}

fn read_csv_headers(file_data: &[u8]) -> Result<Vec<String>, FileError> {
    let header_row = CsvReader::new(Cursor::new(file_data.to_vec()))
        .has_header(false)
        .with_n_rows(Some(1))
        .infer_schema(Some(1))
        .finish()?;

    let mut headers = Vec::with_capacity(header_row.width());
    for series in header_row.get_columns() {
        let as_text = series.cast(&DataType::String)?;
        headers.push(as_text.str()?.get(0).unwrap_or_default().to_string());
    }
    Ok(headers)
}

fn reject_repeated_headers(headers: &[String]) -> Result<(), SchemaError> {
    let mut seen = HashSet::with_capacity(headers.len());
    for header in headers {
        if !seen.insert(header.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                identifier: normalize_header(header),
                first: header.clone(),
                second: header.clone(),
            });
        }
    }
    Ok(())
}

fn series_to_column(series: &Series) -> Result<Column, FileError> {
    let name = series.name().to_string();
    let dtype = series.dtype();

    let column = if dtype.is_integer() || dtype.is_float() {
        let source_type = if dtype.is_integer() {
            SourceType::Integer
        } else {
            SourceType::Float
        };
        let floats = series.cast(&DataType::Float64)?;
        let cells = floats
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Missing, Cell::Number))
            .collect();
        Column::with_type(name, source_type, cells)
    } else if matches!(dtype, DataType::Boolean) {
        let cells = series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Cell::Missing, Cell::Boolean))
            .collect();
        Column::with_type(name, SourceType::Boolean, cells)
    } else {
        let strings = series.cast(&DataType::String)?;
        let cells = strings
            .str()?
            .into_iter()
            .map(|v| v.map_or(Cell::Missing, |s| Cell::Text(s.to_string())))
            .collect();
        Column::with_type(name, SourceType::Text, cells)
    };

    tracing::debug!("CSV column {} read as {:?}", column.name, column.source_type);
    Ok(column)
}

fn read_xlsx(file_data: &[u8]) -> Result<Dataset, FileError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(file_data.to_vec())).map_err(|e| {
        tracing::error!("Failed to open Excel file: {}", e);
        FileError::Workbook(e)
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    tracing::info!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);
    let sheet_name = sheet_names.first().ok_or(FileError::Empty)?;
    let range = workbook.worksheet_range(sheet_name)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(FileError::Empty)?
        .iter()
        .map(|cell| cell.to_string())
        .collect();

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(row.get(idx).map_or(Cell::Missing, cell_from_data));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column::new(name, cells))
        .collect();

    Ok(Dataset::new(columns)?)
}

pub(crate) fn cell_from_data(value: &Data) -> Cell {
    match value {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Boolean(*b),
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Missing, Cell::Timestamp),
        Data::DateTimeIso(s) => parse_timestamp(s).map_or_else(|| Cell::Text(s.clone()), Cell::Timestamp),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Missing,
    }
}

pub async fn load_file_from_url(url: &str) -> Result<Bytes, FileError> {
    let client = Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FileError::Download(format!("Failed to fetch file: {}", e)))?;

    if !response.status().is_success() {
        return Err(FileError::Download(format!(
            "Failed to fetch file. Status: {}",
            response.status()
        )));
    }

    response
        .bytes()
        .await
        .map_err(|e| FileError::Download(format!("Failed to read response bytes: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_format_by_extension() {
        assert_eq!(FileFormat::from_file_name("Sales.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("report.xlsx").unwrap(), FileFormat::Xlsx);
        assert!(matches!(
            FileFormat::from_file_name("notes.txt"),
            Err(FileError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_file_name("no_extension").is_err());
    }

    #[test]
    fn reads_typed_csv_columns() {
        let csv = b"Order Date,Qty,Price,Paid,Region\n\
                    2024-01-01,1,2.5,true,north\n\
                    2024-01-03,,4.0,false,\n\
                    2024-01-03,3,1.5,true,south\n";
        let ds = load_dataset("orders.csv", csv).unwrap();
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.headers(), vec!["Order Date", "Qty", "Price", "Paid", "Region"]);

        let types: Vec<SourceType> = ds.columns().iter().map(|c| c.source_type).collect();
        assert_eq!(
            types,
            vec![
                SourceType::Text,
                SourceType::Integer,
                SourceType::Float,
                SourceType::Boolean,
                SourceType::Text
            ]
        );
        assert_eq!(ds.columns()[1].cells[1], Cell::Missing);
        assert_eq!(ds.columns()[2].cells[0], Cell::Number(2.5));
        assert_eq!(ds.columns()[4].missing_count(), 1);
    }

    #[test]
    fn repeated_csv_header_is_a_schema_error() {
        let err = load_dataset("d.csv", b"A,A\n1,2\n").unwrap_err();
        match err {
            FileError::Schema(SchemaError::DuplicateColumn { identifier, first, second }) => {
                assert_eq!(identifier, "a");
                assert_eq!(first, "A");
                assert_eq!(second, "A");
            }
            other => panic!("expected duplicate column, got {other:?}"),
        }
    }

    #[test]
    fn keeps_raw_csv_headers() {
        let ds = load_dataset("q.csv", b"\"Unit Price\",Qty\n1.5,2\n").unwrap();
        assert_eq!(ds.headers(), vec!["Unit Price", "Qty"]);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(load_dataset("empty.csv", b"  \n"), Err(FileError::Empty)));
    }

    fn workbook_bytes(fill: impl FnOnce(&mut rust_xlsxwriter::Worksheet)) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        fill(workbook.add_worksheet());
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_first_sheet_with_typed_cells() {
        use crate::services::profiler::{classify_column, ColumnKind};
        use chrono::NaiveDate;
        use rust_xlsxwriter::{ExcelDateTime, Format};

        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 0, "Order Date").unwrap();
            sheet.write_string(0, 1, "Qty").unwrap();
            sheet.write_string(0, 2, "Paid").unwrap();
            sheet.write_string(0, 3, "Region").unwrap();
            for (row, day) in [(1u32, 1u8), (2, 3)] {
                let date = ExcelDateTime::from_ymd(2024, 1, day).unwrap();
                sheet.write_datetime_with_format(row, 0, &date, &date_format).unwrap();
                sheet.write_number(row, 1, f64::from(row) * 2.0).unwrap();
                sheet.write_boolean(row, 2, row == 1).unwrap();
            }
            sheet.write_string(1, 3, "north").unwrap();
        });

        let ds = load_dataset("orders.xlsx", &bytes).unwrap();
        assert_eq!(ds.headers(), vec!["Order Date", "Qty", "Paid", "Region"]);
        assert_eq!(ds.row_count(), 2);

        let types: Vec<SourceType> = ds.columns().iter().map(|c| c.source_type).collect();
        assert_eq!(
            types,
            vec![
                SourceType::Timestamp,
                SourceType::Integer,
                SourceType::Boolean,
                SourceType::Text
            ]
        );

        let jan3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(ds.columns()[0].cells[1], Cell::Timestamp(jan3));
        assert_eq!(ds.columns()[1].cells[0], Cell::Number(2.0));
        assert_eq!(ds.columns()[2].cells[1], Cell::Boolean(false));
        assert_eq!(ds.columns()[3].cells[1], Cell::Missing);
        assert_eq!(classify_column(&ds.columns()[0]), ColumnKind::Temporal);
    }

    #[test]
    fn empty_workbook_is_rejected() {
        let bytes = workbook_bytes(|_| {});
        assert!(matches!(load_dataset("blank.xlsx", &bytes), Err(FileError::Empty)));
    }

    #[test]
    fn maps_workbook_cells() {
        assert_eq!(cell_from_data(&Data::Int(4)), Cell::Number(4.0));
        assert_eq!(cell_from_data(&Data::Empty), Cell::Missing);
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Boolean(true));
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2024-01-02T03:04:05".into())),
            Cell::Timestamp(parse_timestamp("2024-01-02 03:04:05").unwrap())
        );
        assert_eq!(
            cell_from_data(&Data::String("x".into())),
            Cell::Text("x".into())
        );
    }
}
