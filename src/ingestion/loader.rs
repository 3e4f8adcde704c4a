//! Data Loader - tries each configured source in priority order

use crate::config::AppConfig;
use crate::error::{AnalyticsError, Result};
use crate::execution::Table;
use crate::ingestion::{CsvSource, DatabaseSource, DatasetSource, SpreadsheetSource};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

/// Which sources the loader may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Database first (when configured), then files
    #[default]
    Auto,
    /// Spreadsheet and CSV only
    Files,
}

impl FromStr for SourceMode {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SourceMode::Auto),
            "files" => Ok(SourceMode::Files),
            other => Err(AnalyticsError::Config(format!(
                "Unknown source mode: {} (expected auto or files)",
                other
            ))),
        }
    }
}

pub struct DataLoader {
    sources: Vec<Box<dyn DatasetSource>>,
}

impl DataLoader {
    pub fn new(config: &AppConfig, mode: SourceMode) -> Self {
        let mut sources: Vec<Box<dyn DatasetSource>> = Vec::new();

        if mode == SourceMode::Auto {
            if let Some(db) = &config.external_db {
                sources.push(Box::new(DatabaseSource::new(db.clone())));
            }
        }
        sources.push(Box::new(SpreadsheetSource::new(
            config.paths.excel_path.clone(),
            config.paths.dataset2_csv.clone(),
        )));
        sources.push(Box::new(CsvSource::new(
            config.paths.dataset1_csv.clone(),
            config.paths.dataset2_csv.clone(),
        )));

        Self { sources }
    }

    pub fn with_sources(sources: Vec<Box<dyn DatasetSource>>) -> Self {
        Self { sources }
    }

    /// Raw dataset 1 and dataset 2 from the first source that succeeds.
    pub async fn load(&self) -> Result<(Table, Table)> {
        for source in &self.sources {
            match source.fetch().await {
                Ok(tables) => {
                    info!(
                        "Using {} source {} ({} + {} rows)",
                        source.source_type(),
                        source.source_uri(),
                        tables.0.len(),
                        tables.1.len()
                    );
                    return Ok(tables);
                }
                Err(AnalyticsError::SourceUnavailable(reason)) => {
                    info!("Skipping {} source: {}", source.source_type(), reason);
                }
                Err(e) => {
                    warn!(
                        "Error loading from {} source {}: {}. Falling back...",
                        source.source_type(),
                        source.source_uri(),
                        e
                    );
                }
            }
        }

        Err(AnalyticsError::SourceUnavailable(
            "No data source found. Please configure SQL connection in .env file or provide data files."
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedSource {
        name: &'static str,
        outcome: Option<Table>,
    }

    #[async_trait]
    impl DatasetSource for FixedSource {
        fn source_type(&self) -> &str {
            self.name
        }

        fn source_uri(&self) -> String {
            format!("fixed://{}", self.name)
        }

        async fn fetch(&self) -> Result<(Table, Table)> {
            match &self.outcome {
                Some(t) => Ok((t.clone(), Table::default())),
                None => Err(AnalyticsError::Database("connection refused".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_next_source() {
        let table = Table::new(vec!["Patient_Number".to_string()], vec![vec![json!("P1")]]);
        let loader = DataLoader::with_sources(vec![
            Box::new(FixedSource { name: "broken", outcome: None }),
            Box::new(FixedSource { name: "good", outcome: Some(table.clone()) }),
        ]);
        let (patients, _) = loader.load().await.unwrap();
        assert_eq!(patients, table);
    }

    #[tokio::test]
    async fn test_no_source_is_source_unavailable() {
        let loader = DataLoader::with_sources(vec![Box::new(FixedSource { name: "broken", outcome: None })]);
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, AnalyticsError::SourceUnavailable(_)));
        assert!(err.to_string().contains("No data source found"));
    }

    #[test]
    fn test_files_mode_skips_database() {
        let mut values = std::collections::HashMap::new();
        values.insert("SQL_HOST".to_string(), "db.local".to_string());
        values.insert("SQL_DATABASE".to_string(), "healthcare".to_string());
        let config = AppConfig::from_map(&values).unwrap();

        let auto = DataLoader::new(&config, SourceMode::Auto);
        let files = DataLoader::new(&config, SourceMode::Files);
        assert_eq!(auto.sources[0].source_type(), "database");
        assert_eq!(files.sources.len(), 2);
        assert_eq!(files.sources[0].source_type(), "spreadsheet");
        assert_eq!("FILES".parse::<SourceMode>().unwrap(), SourceMode::Files);
    }
}
