//! Ingestion Module
//!
//! Loads the two health datasets from the first source that can provide
//! dataset 1:
//! - external relational database (when configured)
//! - spreadsheet with named sheets
//! - CSV files

pub mod csv_source;
pub mod database_source;
pub mod loader;
pub mod spreadsheet_source;

pub use csv_source::{read_csv_table, CsvSource};
pub use database_source::DatabaseSource;
pub use loader::{DataLoader, SourceMode};
pub use spreadsheet_source::SpreadsheetSource;

use crate::error::Result;
use crate::execution::Table;
use crate::schema::{column_names, ACTIVITY_COLUMNS};
use async_trait::async_trait;

/// A place both datasets can be read from.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Source type (e.g. "database", "spreadsheet", "csv")
    fn source_type(&self) -> &str;

    /// Location for logs; never carries credentials
    fn source_uri(&self) -> String;

    /// Raw (uncleaned) dataset 1 and dataset 2.
    async fn fetch(&self) -> Result<(Table, Table)>;
}

/// Zero-row dataset 2 with its three expected columns.
pub fn empty_activity_table() -> Table {
    Table::with_columns(&column_names(&ACTIVITY_COLUMNS))
}
