//! Query Executor - runs one SQL statement on a SQLite connection

use crate::error::{AnalyticsError, Result};
use crate::execution::result::{float_value, Table};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

/// Execute `sql` and collect every row. Driver errors keep their original
/// message inside `AnalyticsError::Execution`.
pub fn execute(conn: &Connection, sql: &str) -> Result<Table> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AnalyticsError::Execution(e.to_string()))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows = stmt
        .query([])
        .map_err(|e| AnalyticsError::Execution(e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| AnalyticsError::Execution(e.to_string()))?
    {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            let value = row
                .get_ref(idx)
                .map_err(|e| AnalyticsError::Execution(e.to_string()))?;
            values.push(sqlite_to_json(value));
        }
        out.push(values);
    }

    debug!("Query returned {} rows x {} columns", out.len(), width);
    Ok(Table::new(columns, out))
}

fn sqlite_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => float_value(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}
