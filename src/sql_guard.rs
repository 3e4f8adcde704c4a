//! SQL Guard - pulls the SQL statement out of an LLM reply and screens it
//!
//! Screening is a textual allow-list: the statement must start with SELECT and
//! must not mention any mutating keyword anywhere, including inside literals
//! and identifiers. Optionally the statement must also parse as exactly one
//! query.

use crate::config::AppConfig;
use crate::error::{AnalyticsError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

/// Rejected anywhere in the statement text, checked in this order.
pub const DANGEROUS_KEYWORDS: [&str; 7] = [
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE",
];

lazy_static! {
    static ref SQL_FENCE: Regex = Regex::new(r"(?i)```sql\n?").unwrap();
    static ref PLAIN_FENCE: Regex = Regex::new(r"```\n?").unwrap();
    static ref FIRST_SELECT: Regex = Regex::new(r"(?is)(SELECT.*?;)").unwrap();
}

/// Best-effort SQL text from a model reply: code fences are removed and the
/// first `SELECT ... ;` span wins. Without one the whole cleaned reply is
/// returned.
pub fn extract_sql(response: &str) -> String {
    let without_sql_fence = SQL_FENCE.replace_all(response, "");
    let cleaned = PLAIN_FENCE.replace_all(&without_sql_fence, "");
    let cleaned = cleaned.trim();

    match FIRST_SELECT.find(cleaned) {
        Some(m) => m.as_str().trim().to_string(),
        None => cleaned.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlGuard {
    /// Keyword and SELECT-prefix screening
    pub enabled: bool,
    /// Additionally require a single parsed query statement
    pub strict: bool,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
        }
    }
}

impl SqlGuard {
    pub fn new(enabled: bool, strict: bool) -> Self {
        Self { enabled, strict }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.enable_safety_checks, config.strict_sql_parse)
    }

    /// Screen an already extracted statement.
    pub fn validate(&self, sql: &str) -> Result<()> {
        if self.enabled {
            let upper = sql.to_uppercase();

            if let Some(keyword) = DANGEROUS_KEYWORDS.iter().find(|kw| upper.contains(*kw)) {
                warn!("Rejected generated SQL containing {}", keyword);
                return Err(AnalyticsError::Safety(format!(
                    "Safety check failed: Dangerous operation '{}' detected",
                    keyword
                )));
            }

            if !upper.trim().starts_with("SELECT") {
                warn!("Rejected generated SQL that is not a SELECT");
                return Err(AnalyticsError::Safety(
                    "Safety check failed: Only SELECT queries are allowed".to_string(),
                ));
            }
        }

        if self.strict {
            check_single_query(sql)?;
        }

        Ok(())
    }

    pub fn extract_and_validate(&self, response: &str) -> Result<String> {
        let sql = extract_sql(response);
        debug!("Extracted SQL: {}", sql);
        self.validate(&sql)?;
        Ok(sql)
    }
}

fn check_single_query(sql: &str) -> Result<()> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, sql).map_err(|e| {
        AnalyticsError::Safety(format!("Safety check failed: Could not parse SQL ({})", e))
    })?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [_] => Err(AnalyticsError::Safety(
            "Safety check failed: Only SELECT queries are allowed".to_string(),
        )),
        other => Err(AnalyticsError::Safety(format!(
            "Safety check failed: Expected exactly one statement, found {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_fenced_block() {
        assert_eq!(extract_sql("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(extract_sql("```SQL\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(extract_sql("```\nSELECT 2;\n```"), "SELECT 2;");
    }

    #[test]
    fn test_extracts_first_statement_from_prose() {
        let reply = "Here is the query:\nSELECT COUNT(*)\nFROM health_dataset_1\nWHERE Smoking = 1;\nIt counts smokers. SELECT 2;";
        assert_eq!(
            extract_sql(reply),
            "SELECT COUNT(*)\nFROM health_dataset_1\nWHERE Smoking = 1;"
        );
    }

    #[test]
    fn test_without_semicolon_whole_reply_is_kept() {
        assert_eq!(extract_sql("  SELECT Age FROM health_dataset_1  "), "SELECT Age FROM health_dataset_1");
        assert_eq!(extract_sql("I cannot answer that."), "I cannot answer that.");
    }

    #[test]
    fn test_rejects_drop() {
        let guard = SqlGuard::default();
        let err = guard
            .extract_and_validate("DROP TABLE health_dataset_1;")
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Safety(_)));
        assert_eq!(
            err.to_string(),
            "Safety check failed: Dangerous operation 'DROP' detected"
        );
    }

    #[test]
    fn test_stacked_statements() {
        let guard = SqlGuard::default();
        // only the first statement is extracted
        let sql = guard
            .extract_and_validate("SELECT 1; DROP TABLE health_dataset_1;")
            .unwrap();
        assert_eq!(sql, "SELECT 1;");

        let err = guard
            .validate("SELECT * FROM health_dataset_1 WHERE Patient_Number = 'x'; DROP TABLE t;")
            .unwrap_err();
        assert!(err.to_string().contains("'DROP'"));
    }

    #[test]
    fn test_identifier_containing_keyword_is_rejected() {
        // known limitation of the textual screen
        let guard = SqlGuard::default();
        let err = guard.validate("SELECT created_at FROM health_dataset_1;").unwrap_err();
        assert!(err.to_string().contains("'CREATE'"));
    }

    #[test]
    fn test_non_select_is_rejected() {
        let guard = SqlGuard::default();
        let err = guard.validate("PRAGMA table_info(health_dataset_1);").unwrap_err();
        assert_eq!(err.to_string(), "Safety check failed: Only SELECT queries are allowed");
    }

    #[test]
    fn test_disabled_guard_accepts_anything() {
        let guard = SqlGuard::new(false, false);
        assert!(guard.validate("DELETE FROM health_dataset_1;").is_ok());
    }

    #[test]
    fn test_strict_parse() {
        let guard = SqlGuard::new(true, true);
        assert!(guard
            .validate("SELECT AVG(Age) FROM health_dataset_1 WHERE Smoking = 1;")
            .is_ok());
        assert!(guard.validate("SELECT * FROM health_dataset_1 WHERE (;").is_err());
        assert!(guard.validate("SELECT 1; SELECT 2;").is_err());
    }

    #[test]
    fn test_accepted_sql_is_select_without_mutations() {
        let guard = SqlGuard::default();
        let replies = [
            "```sql\nSELECT COUNT(*) FROM health_dataset_1;\n```",
            "select avg(BMI) from health_dataset_1;",
            "Sure!\nSELECT * FROM health_dataset_2 WHERE Day_Number = 3;",
            "UPDATE health_dataset_1 SET Age = 1;",
            "SELECT 1; DELETE FROM health_dataset_2;",
            "WITH x AS (SELECT 1) SELECT * FROM x;",
            "Here you go: insert into t values (1);",
            "SELECT Patient_Number FROM health_dataset_1 -- truncate later",
            "",
            "   ",
            "```\n```",
        ];

        for reply in replies {
            if let Ok(sql) = guard.extract_and_validate(reply) {
                let upper = sql.to_uppercase();
                assert!(upper.trim_start().starts_with("SELECT"), "accepted: {}", sql);
                for kw in DANGEROUS_KEYWORDS {
                    assert!(!upper.contains(kw), "accepted {} in {}", kw, sql);
                }
            }
        }
    }
}
