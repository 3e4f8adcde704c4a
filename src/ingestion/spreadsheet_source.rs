//! Spreadsheet Source - reads both datasets from named workbook sheets
//!
//! Dataset 2 is located by sheet-name heuristics; when no sheet matches it
//! falls back to the sibling CSV file, then to an empty placeholder. A
//! workbook without a usable dataset 1 sheet is an error, so the loader
//! moves on to the CSV source.

use crate::error::{AnalyticsError, Result};
use crate::execution::result::float_value;
use crate::execution::Table;
use crate::ingestion::csv_source::read_csv_table;
use crate::ingestion::{empty_activity_table, DatasetSource};
use crate::schema::{PATIENT_COLUMNS, PATIENT_NUMBER};
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DATASET1_SHEET: &str = "Health Dataset 1 (N=2000)";

pub struct SpreadsheetSource {
    workbook: PathBuf,
    dataset2_csv: PathBuf,
}

impl SpreadsheetSource {
    pub fn new(workbook: impl Into<PathBuf>, dataset2_csv: impl Into<PathBuf>) -> Self {
        Self {
            workbook: workbook.into(),
            dataset2_csv: dataset2_csv.into(),
        }
    }
}

impl SpreadsheetSource {
    /// Dataset 2 when the workbook has no activity sheet.
    fn fallback_activity(&self) -> Result<Table> {
        if self.dataset2_csv.exists() {
            let table = read_csv_table(&self.dataset2_csv)?;
            info!("Loaded Dataset 2 from CSV: {} records", table.len());
            Ok(table)
        } else {
            warn!("Dataset 2 not found. Creating empty dataset (will be skipped in joins).");
            Ok(empty_activity_table())
        }
    }
}

#[async_trait]
impl DatasetSource for SpreadsheetSource {
    fn source_type(&self) -> &str {
        "spreadsheet"
    }

    fn source_uri(&self) -> String {
        self.workbook.display().to_string()
    }

    async fn fetch(&self) -> Result<(Table, Table)> {
        if !self.workbook.exists() {
            return Err(AnalyticsError::SourceUnavailable(format!(
                "Spreadsheet not found: {}",
                self.workbook.display()
            )));
        }

        let mut workbook = open_workbook_auto(&self.workbook)?;
        let sheet_names = workbook.sheet_names();
        info!("Loading from spreadsheet: {}", self.workbook.display());

        let first_sheet = select_dataset1_sheet(&sheet_names).ok_or_else(|| {
            AnalyticsError::Spreadsheet(format!(
                "{} has no dataset 1 sheet",
                self.workbook.display()
            ))
        })?;
        let patients = range_to_table(&workbook.worksheet_range(&first_sheet)?);
        if !has_patient_columns(&patients) {
            return Err(AnalyticsError::Spreadsheet(format!(
                "Sheet '{}' does not hold patient data (columns: {})",
                first_sheet,
                patients.columns.join(", ")
            )));
        }
        info!("Loaded Dataset 1 from sheet '{}': {} records", first_sheet, patients.len());

        let activity = match select_dataset2_sheet(&sheet_names, &first_sheet) {
            Some(sheet) => {
                let table = range_to_table(&workbook.worksheet_range(&sheet)?);
                info!("Loaded Dataset 2 from sheet '{}': {} records", sheet, table.len());
                table
            }
            None => self.fallback_activity()?,
        };

        Ok((patients, activity))
    }
}

fn is_activity_sheet(name: &str) -> bool {
    name.contains("Dataset 2") || name.contains("Physical") || name.to_lowercase().contains("activity")
}

/// The canonical dataset 1 sheet, else one mentioning "Dataset 1", else the
/// first sheet that is not an activity sheet.
pub fn select_dataset1_sheet(sheet_names: &[String]) -> Option<String> {
    sheet_names
        .iter()
        .find(|s| s.as_str() == DATASET1_SHEET)
        .or_else(|| sheet_names.iter().find(|s| s.contains("Dataset 1")))
        .or_else(|| sheet_names.iter().find(|s| !is_activity_sheet(s)))
        .cloned()
}

pub fn select_dataset2_sheet(sheet_names: &[String], dataset1_sheet: &str) -> Option<String> {
    sheet_names
        .iter()
        .filter(|s| s.as_str() != dataset1_sheet)
        .find(|s| is_activity_sheet(s))
        .cloned()
}

/// `Patient_Number` plus at least one other dataset 1 column.
fn has_patient_columns(table: &Table) -> bool {
    table.column_index(PATIENT_NUMBER).is_some()
        && PATIENT_COLUMNS
            .iter()
            .filter(|c| c.name != PATIENT_NUMBER)
            .any(|c| table.column_index(c.name).is_some())
}

/// First row is the header; trailing empty rows are skipped.
fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Table::default(),
    };

    let body = rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            (0..columns.len())
                .map(|idx| row.get(idx).map(cell_to_json).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Table::new(columns, body)
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.trim().to_string()),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dataset1_sheet_selection() {
        let sheets = names(&["Readme", DATASET1_SHEET, "Health Dataset 2 (N=20000)"]);
        assert_eq!(select_dataset1_sheet(&sheets).as_deref(), Some(DATASET1_SHEET));

        let sheets = names(&["Notes", "Dataset 1 export"]);
        assert_eq!(select_dataset1_sheet(&sheets).as_deref(), Some("Dataset 1 export"));

        let sheets = names(&["Sheet1"]);
        assert_eq!(select_dataset1_sheet(&sheets).as_deref(), Some("Sheet1"));
        assert_eq!(select_dataset1_sheet(&[]), None);
    }

    #[test]
    fn test_activity_sheet_never_becomes_dataset1() {
        let sheets = names(&["Health Dataset 2 (N=20000)", "Notes"]);
        assert_eq!(select_dataset1_sheet(&sheets).as_deref(), Some("Notes"));

        let sheets = names(&["Health Dataset 2 (N=20000)", "Physical Steps"]);
        assert_eq!(select_dataset1_sheet(&sheets), None);
    }

    #[test]
    fn test_patient_column_check() {
        let activity = Table::with_columns(&["Patient_Number", "Day_Number", "Physical_activity"]);
        assert!(!has_patient_columns(&activity));

        let notes = Table::with_columns(&["Comment"]);
        assert!(!has_patient_columns(&notes));

        let patients = Table::with_columns(&["Patient_Number", "Age", "BMI"]);
        assert!(has_patient_columns(&patients));
    }

    fn sample_range() -> Range<Data> {
        let mut range = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String("Patient_Number".to_string()));
        range.set_value((0, 1), Data::String(" Age ".to_string()));
        range.set_value((0, 2), Data::String("Smoking".to_string()));
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::Float(45.0));
        range.set_value((1, 2), Data::Bool(true));
        // row 2 left blank
        range.set_value((3, 0), Data::String("P00002".to_string()));
        range.set_value((3, 1), Data::String("   ".to_string()));
        range
    }

    #[test]
    fn test_range_to_table_uses_header_and_skips_blank_rows() {
        let table = range_to_table(&sample_range());
        assert_eq!(table.columns, vec!["Patient_Number", "Age", "Smoking"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], serde_json::json!(1));
        assert_eq!(table.rows[0][2], Value::Bool(true));
        assert_eq!(table.rows[1][0], serde_json::json!("P00002"));
        assert_eq!(table.rows[1][1], Value::Null);
        assert_eq!(table.rows[1][2], Value::Null);
        assert!(has_patient_columns(&table));
    }

    #[test]
    fn test_cell_to_json() {
        assert_eq!(cell_to_json(&Data::Empty), Value::Null);
        assert_eq!(cell_to_json(&Data::Int(7)), serde_json::json!(7));
        assert_eq!(cell_to_json(&Data::String(" P1 ".to_string())), serde_json::json!("P1"));
        assert_eq!(cell_to_json(&Data::Bool(false)), Value::Bool(false));
        assert!(cell_to_json(&Data::Float(13.25)).as_f64().is_some());
    }

    #[test]
    fn test_empty_range_yields_empty_table() {
        let table = range_to_table(&Range::<Data>::empty());
        assert!(table.columns.is_empty());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_missing_workbook_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = SpreadsheetSource::new(dir.path().join("absent.xlsm"), dir.path().join("absent.csv"));
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, AnalyticsError::SourceUnavailable(_)));
    }

    #[test]
    fn test_activity_falls_back_to_csv_then_placeholder() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv_path = dir.path().join("health_dataset_2.csv");
        let source = SpreadsheetSource::new(dir.path().join("book.xlsm"), &csv_path);

        let placeholder = source.fallback_activity().unwrap();
        assert_eq!(placeholder.columns, vec!["Patient_Number", "Day_Number", "Physical_activity"]);
        assert!(placeholder.is_empty());

        std::fs::write(&csv_path, "Patient_Number,Day_Number,Physical_activity\nP00001,1,5000\n").unwrap();
        let table = source.fallback_activity().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns[2], "Physical_activity");
    }

    #[test]
    fn test_dataset2_sheet_heuristics() {
        let sheets = names(&[DATASET1_SHEET, "Health Dataset 2 (N=20000)"]);
        assert_eq!(
            select_dataset2_sheet(&sheets, DATASET1_SHEET).as_deref(),
            Some("Health Dataset 2 (N=20000)")
        );

        let sheets = names(&[DATASET1_SHEET, "Physical Steps"]);
        assert_eq!(select_dataset2_sheet(&sheets, DATASET1_SHEET).as_deref(), Some("Physical Steps"));

        let sheets = names(&[DATASET1_SHEET, "Daily ACTIVITY log"]);
        assert_eq!(
            select_dataset2_sheet(&sheets, DATASET1_SHEET).as_deref(),
            Some("Daily ACTIVITY log")
        );

        let sheets = names(&[DATASET1_SHEET, "Notes"]);
        assert_eq!(select_dataset2_sheet(&sheets, DATASET1_SHEET), None);
    }
}
