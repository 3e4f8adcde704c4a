//! CSV Source - reads the datasets from CSV files on disk

use crate::error::{AnalyticsError, Result};
use crate::execution::Table;
use crate::ingestion::{empty_activity_table, DatasetSource};
use async_trait::async_trait;
use csv::ReaderBuilder;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct CsvSource {
    dataset1: PathBuf,
    dataset2: PathBuf,
}

impl CsvSource {
    pub fn new(dataset1: impl Into<PathBuf>, dataset2: impl Into<PathBuf>) -> Self {
        Self {
            dataset1: dataset1.into(),
            dataset2: dataset2.into(),
        }
    }
}

#[async_trait]
impl DatasetSource for CsvSource {
    fn source_type(&self) -> &str {
        "csv"
    }

    fn source_uri(&self) -> String {
        self.dataset1.display().to_string()
    }

    async fn fetch(&self) -> Result<(Table, Table)> {
        if !self.dataset1.exists() {
            return Err(AnalyticsError::SourceUnavailable(format!(
                "Dataset file not found: {}",
                self.dataset1.display()
            )));
        }

        let patients = read_csv_table(&self.dataset1)?;
        info!("Loaded Dataset 1 from CSV: {} records", patients.len());

        let activity = if self.dataset2.exists() {
            let table = read_csv_table(&self.dataset2)?;
            info!("Loaded Dataset 2 from CSV: {} records", table.len());
            table
        } else {
            empty_activity_table()
        };

        Ok((patients, activity))
    }
}

/// Read a headed CSV file into a `Table`, typing each cell.
pub fn read_csv_table(path: &Path) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row = (0..headers.len())
            .map(|idx| coerce_cell(record.get(idx).unwrap_or("")))
            .collect();
        rows.push(row);
    }

    Ok(Table::new(headers, rows))
}

fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_csv_table_types_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.csv");
        fs::write(&path, "Patient_Number,Age,BMI\nP00001,64,31.5\nP00002,,abc\n").unwrap();

        let table = read_csv_table(&path).unwrap();
        assert_eq!(table.columns, vec!["Patient_Number", "Age", "BMI"]);
        assert_eq!(table.rows[0], vec![json!("P00001"), json!(64), json!(31.5)]);
        assert_eq!(table.rows[1], vec![json!("P00002"), Value::Null, json!("abc")]);
    }
}
