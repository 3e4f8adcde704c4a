use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    SourceUnavailable(String),

    #[error("Data error: {0}")]
    Data(String),

    /// Message is surfaced verbatim to the caller.
    #[error("{0}")]
    Safety(String),

    #[error("Error executing query: {0}")]
    Execution(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(err: rusqlite::Error) -> Self {
        AnalyticsError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for AnalyticsError {
    fn from(err: sqlx::Error) -> Self {
        AnalyticsError::Database(err.to_string())
    }
}

impl From<calamine::Error> for AnalyticsError {
    fn from(err: calamine::Error) -> Self {
        AnalyticsError::Spreadsheet(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
