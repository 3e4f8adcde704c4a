//! Environment-sourced configuration.
//!
//! `.env` is loaded by the binary before `AppConfig::from_env` runs. Parsing
//! goes through a key lookup so callers (and tests) can supply values without
//! touching the process environment.

use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Hosted chat-completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Groq,
}

impl FromStr for LlmProvider {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "groq" => Ok(LlmProvider::Groq),
            other => Err(AnalyticsError::Config(format!(
                "Unsupported model provider: {} (expected openai or groq)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub openai_api_key: String,
    pub groq_api_key: String,
    pub openai_base_url: String,
    pub groq_base_url: String,
}

/// Engine behind the external source database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    MySql,
    Postgres,
    Sqlite,
}

impl FromStr for DbKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DbKind::MySql),
            "postgresql" | "postgres" => Ok(DbKind::Postgres),
            "sqlite" => Ok(DbKind::Sqlite),
            other => Err(AnalyticsError::Config(format!(
                "Unsupported database type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalDbConfig {
    pub kind: DbKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table_1: String,
    pub table_2: String,
}

impl ExternalDbConfig {
    /// Connection URL for the server-backed engines. For sqlite the
    /// database name is the file path and no URL is built.
    pub fn connection_url(&self) -> Option<String> {
        let scheme = match self.kind {
            DbKind::MySql => "mysql",
            DbKind::Postgres => "postgres",
            DbKind::Sqlite => return None,
        };
        Some(format!(
            "{}://{}:{}@{}:{}/{}",
            scheme, self.user, self.password, self.host, self.port, self.database
        ))
    }

    /// Human-readable target without credentials, for logs.
    pub fn describe(&self) -> String {
        let kind = format!("{:?}", self.kind).to_lowercase();
        format!("{}://{}/{}", kind, self.host, self.database)
    }
}

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub database_path: PathBuf,
    pub excel_path: PathBuf,
    pub dataset1_csv: PathBuf,
    pub dataset2_csv: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/healthcare.db"),
            excel_path: PathBuf::from("lu1828272yg3dhb.xlsm"),
            dataset1_csv: PathBuf::from("data/health_dataset_1.csv"),
            dataset2_csv: PathBuf::from("data/health_dataset_2.csv"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmSettings,
    /// `None` when no external database is configured.
    pub external_db: Option<ExternalDbConfig>,
    pub paths: DataPaths,
    pub enable_safety_checks: bool,
    pub strict_sql_parse: bool,
    pub privacy_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let llm = LlmSettings {
            provider: get_or("MODEL_PROVIDER", "groq").parse()?,
            model: get_or("MODEL_NAME", DEFAULT_MODEL),
            temperature: parse_number(&get_or("TEMPERATURE", "0.3"), "TEMPERATURE")?,
            max_tokens: parse_number(&get_or("MAX_TOKENS", "1024"), "MAX_TOKENS")?,
            openai_api_key: get_or("OPENAI_API_KEY", ""),
            groq_api_key: get_or("GROQ_API_KEY", ""),
            openai_base_url: get_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            groq_base_url: get_or("GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL),
        };

        // The source database is only attempted when both a host and a
        // database name are configured.
        let external_db = match (get("SQL_HOST"), get("SQL_DATABASE")) {
            (Some(host), Some(database)) => {
                let kind: DbKind = get_or("SQL_DB_TYPE", "mysql").parse()?;
                let default_port = match kind {
                    DbKind::Postgres => "5432",
                    _ => "3306",
                };
                Some(ExternalDbConfig {
                    kind,
                    host,
                    port: parse_number(&get_or("SQL_PORT", default_port), "SQL_PORT")?,
                    user: get_or("SQL_USER", "root"),
                    password: get_or("SQL_PASSWORD", ""),
                    database,
                    table_1: get_or("SQL_TABLE_1", "health_dataset_1"),
                    table_2: get_or("SQL_TABLE_2", "health_dataset_2"),
                })
            }
            _ => None,
        };

        let defaults = DataPaths::default();
        let paths = DataPaths {
            database_path: get("DATABASE_PATH").map(PathBuf::from).unwrap_or(defaults.database_path),
            excel_path: get("EXCEL_FILE_PATH").map(PathBuf::from).unwrap_or(defaults.excel_path),
            dataset1_csv: get("DATASET1_PATH").map(PathBuf::from).unwrap_or(defaults.dataset1_csv),
            dataset2_csv: get("DATASET2_PATH").map(PathBuf::from).unwrap_or(defaults.dataset2_csv),
        };

        Ok(Self {
            llm,
            external_db,
            paths,
            enable_safety_checks: parse_flag(get("ENABLE_SAFETY_CHECKS"), true, "ENABLE_SAFETY_CHECKS")?,
            strict_sql_parse: parse_flag(get("SQL_STRICT_PARSE"), false, "SQL_STRICT_PARSE")?,
            privacy_mode: parse_flag(get("PRIVACY_MODE"), true, "PRIVACY_MODE")?,
        })
    }
}

fn parse_number<T: FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| AnalyticsError::Config(format!("{} must be a number, got '{}'", key, raw)))
}

fn parse_flag(raw: Option<String>, default: bool, key: &str) -> Result<bool> {
    match raw.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => Err(AnalyticsError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
