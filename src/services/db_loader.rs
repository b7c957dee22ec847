use async_trait::async_trait;
use rusqlite::{params_from_iter, types::Value, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::LoadError;
use crate::models::{Cell, Dataset, SourceType};
use crate::services::auth::Session;
use crate::services::profiler::{normalize_headers, utils::clean_table_name};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    #[default]
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Destination {
    pub table: String,
    #[serde(default)]
    pub mode: LoadMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub table: String,
    pub rows_loaded: usize,
    pub columns: Vec<String>,
    pub loaded_by: String,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn bulk_load(
        &self,
        session: &Session,
        dataset: &Dataset,
        destination: &Destination,
    ) -> Result<LoadResult, LoadError>;
}

pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        info!("Opening warehouse at {}", path.display());
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open warehouse database: {}", e);
            LoadError::Database(e)
        })?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, LoadError> {
        let conn = Connection::open_in_memory()?;
        debug!("Successfully created in-memory warehouse connection");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn row_count(&self, table: &str) -> Result<usize, LoadError> {
        let conn = self.conn.lock().map_err(|_| LoadError::Poisoned)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&clean_table_name(table)));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn write(
        &self,
        dataset: &Dataset,
        table: &str,
        columns: &[String],
        mode: LoadMode,
    ) -> Result<usize, LoadError> {
        let mut conn = self.conn.lock().map_err(|_| LoadError::Poisoned)?;
        let tx = conn.transaction()?;
        let quoted_table = quote_ident(table);

        if mode == LoadMode::Replace {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quoted_table), [])?;
        } else {
            let existing = existing_columns(&tx, &quoted_table)?;
            if !existing.is_empty() && !same_column_set(&existing, columns) {
                error!("Append into {} rejected: table has columns {:?}", table, existing);
                return Err(LoadError::InvalidDestination(format!(
                    "table {} has columns [{}], upload has [{}]",
                    table,
                    existing.join(", "),
                    columns.join(", ")
                )));
            }
        }

        let create_sql = generate_create_table_sql(table, columns, dataset);
        debug!("Create table SQL: {}", create_sql);
        tx.execute(&create_sql, [])?;

        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table,
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        debug!("Insert SQL template: {}", insert_sql);

        let rows = dataset.row_count();
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row in 0..rows {
                if row % 1000 == 0 {
                    debug!("Inserting row {}/{}", row, rows);
                }
                let params = dataset.columns().iter().map(|c| sql_value(&c.cells[row]));
                stmt.execute(params_from_iter(params)).map_err(|e| {
                    error!("Failed to insert row {}: {}", row, e);
                    LoadError::Database(e)
                })?;
            }
        }

        tx.commit()?;
        Ok(rows)
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn bulk_load(
        &self,
        session: &Session,
        dataset: &Dataset,
        destination: &Destination,
    ) -> Result<LoadResult, LoadError> {
        let start = std::time::Instant::now();
        if destination.table.trim().is_empty() {
            return Err(LoadError::InvalidDestination("table name is empty".to_string()));
        }
        if dataset.column_count() == 0 {
            return Err(LoadError::InvalidDestination("dataset has no columns".to_string()));
        }

        let table = clean_table_name(&destination.table);
        let columns: Vec<String> = normalize_headers(&dataset.headers())?
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();

        info!(
            "Loading {} rows into {} ({:?}) for {}",
            dataset.row_count(),
            table,
            destination.mode,
            session.email
        );
        let rows_loaded = self.write(dataset, &table, &columns, destination.mode)?;
        info!("Loaded {} rows into {} in {:?}", rows_loaded, table, start.elapsed());

        Ok(LoadResult {
            table,
            rows_loaded,
            columns,
            loaded_by: session.user_id.clone(),
        })
    }
}

/// Column names of `quoted_table`, empty when the table does not exist.
fn existing_columns(conn: &Connection, quoted_table: &str) -> Result<Vec<String>, LoadError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted_table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn same_column_set(existing: &[String], columns: &[String]) -> bool {
    let mut existing: Vec<&str> = existing.iter().map(String::as_str).collect();
    let mut incoming: Vec<&str> = columns.iter().map(String::as_str).collect();
    existing.sort_unstable();
    incoming.sort_unstable();
    existing == incoming
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Integer | SourceType::Boolean => "INTEGER",
        SourceType::Float => "REAL",
        SourceType::Text | SourceType::Timestamp | SourceType::Mixed => "TEXT",
    }
}

fn generate_create_table_sql(table: &str, columns: &[String], dataset: &Dataset) -> String {
    let defs = columns
        .iter()
        .zip(dataset.columns())
        .map(|(name, column)| format!("{} {}", quote_ident(name), sql_type(column.source_type)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(table), defs)
}

fn sql_value(cell: &Cell) -> Value {
    match cell {
        _ if cell.is_missing() => Value::Null,
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Value::Integer(*n as i64),
        Cell::Number(n) => Value::Real(*n),
        Cell::Boolean(b) => Value::Integer(i64::from(*b)),
        Cell::Text(s) => Value::Text(s.clone()),
        Cell::Timestamp(ts) => Value::Text(ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Cell::Missing => Value::Null,
    }
}
