pub mod audit;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod generator;
pub mod ingestion;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod records;
pub mod schema;
pub mod sql_guard;
pub mod store;

pub use config::AppConfig;
pub use error::{AnalyticsError, Result};
pub use execution::Table;
pub use ingestion::{DataLoader, SourceMode};
pub use pipeline::{HealthAnalytics, PipelineResult, PipelineStage, QueryMode};
