//! Database Source - reads both datasets from an external relational database
//!
//! MySQL and PostgreSQL go through sqlx's `Any` driver; a sqlite source file
//! is read with rusqlite.

use crate::config::{DbKind, ExternalDbConfig};
use crate::error::{AnalyticsError, Result};
use crate::execution::result::float_value;
use crate::execution::{self, Table};
use crate::ingestion::{empty_activity_table, DatasetSource};
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use sqlx::any::{install_default_drivers, AnyRow};
use sqlx::{AnyConnection, Column, Connection as _, Row};
use tracing::{info, warn};

pub struct DatabaseSource {
    config: ExternalDbConfig,
}

impl DatabaseSource {
    pub fn new(config: ExternalDbConfig) -> Self {
        Self { config }
    }

    async fn fetch_remote(&self, url: &str) -> Result<(Table, Table)> {
        install_default_drivers();
        let mut conn = AnyConnection::connect(url).await?;

        let patients = fetch_any_table(&mut conn, &self.config.table_1).await?;
        info!(
            "Loaded Dataset 1 from SQL table '{}': {} records",
            self.config.table_1,
            patients.len()
        );

        let activity = match fetch_any_table(&mut conn, &self.config.table_2).await {
            Ok(table) => {
                info!(
                    "Loaded Dataset 2 from SQL table '{}': {} records",
                    self.config.table_2,
                    table.len()
                );
                table
            }
            Err(e) => {
                warn!("Dataset 2 table '{}' not found or error: {}", self.config.table_2, e);
                empty_activity_table()
            }
        };

        if let Err(e) = conn.close().await {
            warn!("Failed to close source database connection: {}", e);
        }
        Ok((patients, activity))
    }

    fn fetch_sqlite(&self) -> Result<(Table, Table)> {
        let conn = Connection::open_with_flags(&self.config.database, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let patients = execution::execute(&conn, &select_all(&self.config.table_1))?;
        info!(
            "Loaded Dataset 1 from SQL table '{}': {} records",
            self.config.table_1,
            patients.len()
        );

        let activity = execution::execute(&conn, &select_all(&self.config.table_2)).unwrap_or_else(|e| {
            warn!("Dataset 2 table '{}' not found or error: {}", self.config.table_2, e);
            empty_activity_table()
        });

        Ok((patients, activity))
    }
}

#[async_trait]
impl DatasetSource for DatabaseSource {
    fn source_type(&self) -> &str {
        "database"
    }

    fn source_uri(&self) -> String {
        self.config.describe()
    }

    async fn fetch(&self) -> Result<(Table, Table)> {
        info!("Attempting to load from SQL database: {}", self.config.describe());
        match (self.config.kind, self.config.connection_url()) {
            (DbKind::Sqlite, _) => self.fetch_sqlite(),
            (_, Some(url)) => self.fetch_remote(&url).await,
            (kind, None) => Err(AnalyticsError::Config(format!(
                "No connection URL for database type {:?}",
                kind
            ))),
        }
    }
}

fn select_all(table: &str) -> String {
    format!("SELECT * FROM {}", table)
}

async fn fetch_any_table(conn: &mut AnyConnection, table: &str) -> Result<Table> {
    let rows: Vec<AnyRow> = sqlx::query(&select_all(table)).fetch_all(&mut *conn).await?;

    let columns: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => Vec::new(),
    };

    let body = rows
        .iter()
        .map(|row| (0..columns.len()).map(|idx| any_cell(row, idx)).collect())
        .collect();

    Ok(Table::new(columns, body))
}

/// Decode one cell by trying the types the `Any` driver can carry.
fn any_cell(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|i| Value::Number(i.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| Value::Number(i.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(|i| Value::Number(i.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(float_value).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| float_value(f as f64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}
