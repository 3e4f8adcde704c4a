//! Pipeline - question in, SQL, result subset and insights out
//!
//! One call runs: SQL generation, safety screening, execution against the
//! local store, then insight writing from a summary of the returned rows.
//! Failures are reported inside the returned [`PipelineResult`] rather than
//! as `Err`.

use crate::cleaning::{clean_activity, clean_patients};
use crate::config::AppConfig;
use crate::error::Result;
use crate::execution::Table;
use crate::ingestion::{DataLoader, SourceMode};
use crate::llm::{build_backend, LlmBackend};
use crate::prompts::{
    insight_prompt, sql_generation_prompt, summarize_results, INSIGHT_SYSTEM_PROMPT, SQL_SYSTEM_PROMPT,
};
use crate::records::{ActivityRecord, PatientRecord};
use crate::schema::{schema_description, PATIENTS_TABLE};
use crate::sql_guard::SqlGuard;
use crate::store::LocalStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const PYTHON_UNSUPPORTED_NOTICE: &str =
    "Python query execution not yet implemented. Using SQL instead.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Sql,
    /// Declared but not executed; runs on the SQL path with a notice.
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    GeneratingSql,
    Executing,
    GeneratingInsights,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub user_query: String,
    pub sql_query: Option<String>,
    /// Always `None`; Python generation is not performed.
    pub python_query: Option<String>,
    pub query_type: QueryMode,
    /// Set only once the SQL has passed screening and executed.
    pub query_results: Option<Table>,
    pub insights: Option<String>,
    pub error: Option<String>,
    pub stage: PipelineStage,
    /// Non-fatal messages. Python mode lands here instead of in `error`, so
    /// the question is still answered through SQL.
    pub notices: Vec<String>,
}

impl PipelineResult {
    fn new(user_query: &str, mode: QueryMode) -> Self {
        Self {
            user_query: user_query.to_string(),
            sql_query: None,
            python_query: None,
            query_type: mode,
            query_results: None,
            insights: None,
            error: None,
            stage: PipelineStage::GeneratingSql,
            notices: Vec::new(),
        }
    }

    fn fail(mut self, error: String) -> Self {
        warn!("Query failed during {:?}: {}", self.stage, error);
        self.error = Some(error);
        self.stage = PipelineStage::Error;
        self
    }

    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Done
    }
}

/// Both datasets from the first available source, cleaned.
pub async fn load_clean_datasets(
    config: &AppConfig,
    mode: SourceMode,
) -> Result<(Vec<PatientRecord>, Vec<ActivityRecord>)> {
    let (raw_patients, raw_activity) = DataLoader::new(config, mode).load().await?;
    Ok((clean_patients(&raw_patients)?, clean_activity(&raw_activity)?))
}

pub struct HealthAnalytics {
    store: LocalStore,
    llm: Box<dyn LlmBackend>,
    guard: SqlGuard,
    schema_description: String,
    privacy_mode: bool,
}

impl HealthAnalytics {
    pub fn new(store: LocalStore, llm: Box<dyn LlmBackend>, guard: SqlGuard) -> Self {
        Self {
            store,
            llm,
            guard,
            schema_description: schema_description(),
            privacy_mode: true,
        }
    }

    pub fn with_privacy_mode(mut self, privacy_mode: bool) -> Self {
        self.privacy_mode = privacy_mode;
        self
    }

    /// Load and clean both datasets, rebuild the local store and connect the
    /// configured model.
    pub async fn bootstrap(config: &AppConfig, mode: SourceMode) -> Result<Self> {
        let llm = build_backend(&config.llm)?;

        let (patients, activity) = load_clean_datasets(config, mode).await?;

        let mut store = LocalStore::open(&config.paths.database_path)?;
        store.materialize(&patients, &activity)?;
        for (table, columns) in store.schema_info()? {
            debug!("{}: {}", table, columns.join(", "));
        }

        info!(
            "Using {} model {} (store: {})",
            llm.name(),
            config.llm.model,
            config.paths.database_path.display()
        );

        Ok(Self::new(store, llm, SqlGuard::from_config(config)).with_privacy_mode(config.privacy_mode))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn schema_description(&self) -> &str {
        &self.schema_description
    }

    pub async fn process_query(&self, user_query: &str, mode: QueryMode) -> PipelineResult {
        let span = info_span!("process_query", query_id = %Uuid::new_v4());
        self.run(user_query, mode).instrument(span).await
    }

    async fn run(&self, user_query: &str, mode: QueryMode) -> PipelineResult {
        if self.privacy_mode {
            info!("Processing query ({} chars)", user_query.chars().count());
        } else {
            info!("Processing query: {}", user_query);
        }

        let mut result = PipelineResult::new(user_query, mode);
        if mode == QueryMode::Python {
            result.notices.push(PYTHON_UNSUPPORTED_NOTICE.to_string());
        }

        let sql = match self.generate_sql(user_query).await {
            Ok(sql) => sql,
            Err(error) => return result.fail(error),
        };
        info!("Generated SQL: {}", sql);
        result.sql_query = Some(sql.clone());

        result.stage = PipelineStage::Executing;
        let rows = match self.store.execute(&sql) {
            Ok(rows) => rows,
            Err(e) => return result.fail(e.to_string()),
        };
        info!("Query returned {} rows", rows.len());

        result.stage = PipelineStage::GeneratingInsights;
        let total_patients = self.total_patients_for(&sql);
        let summary = summarize_results(&rows, total_patients);
        result.query_results = Some(rows);
        result.insights = Some(self.generate_insights(user_query, &sql, &summary).await);

        result.stage = PipelineStage::Done;
        result
    }

    async fn generate_sql(&self, user_query: &str) -> std::result::Result<String, String> {
        let prompt = sql_generation_prompt(user_query, &self.schema_description);
        let response = self
            .llm
            .complete(SQL_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| format!("Error generating SQL: {}", e))?;
        debug!("SQL model response: {}", response);

        self.guard.extract_and_validate(&response).map_err(|e| e.to_string())
    }

    /// Patient total used for percentages; only looked up for filtered counts.
    fn total_patients_for(&self, sql: &str) -> Option<i64> {
        let upper = sql.to_uppercase();
        if !(upper.contains("COUNT") && upper.contains("WHERE")) {
            return None;
        }

        let total = self
            .store
            .execute(&format!("SELECT COUNT(*) AS total FROM {}", PATIENTS_TABLE))
            .ok()?;
        total.single_value().and_then(|(_, v)| v.as_i64())
    }

    async fn generate_insights(&self, user_query: &str, sql: &str, summary: &str) -> String {
        let prompt = insight_prompt(user_query, sql, summary);
        match self.llm.complete(INSIGHT_SYSTEM_PROMPT, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Insight generation failed: {}", e);
                format!("Error generating insights: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_stage_and_mode() {
        let result = PipelineResult::new("How many?", QueryMode::Python)
            .fail("Safety check failed: Only SELECT queries are allowed".to_string());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["query_type"], "python");
        assert_eq!(value["stage"], "error");
        assert_eq!(value["query_results"], serde_json::Value::Null);
        assert!(!result.is_success());
    }
}
