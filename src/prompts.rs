//! Prompts - text sent to the LLM for SQL generation and insight writing
//!
//! The insight prompt only ever carries a summary of the executed query's
//! result rows, never the datasets themselves.

use crate::execution::{display_value, Table};
use serde_json::Value;

/// System prompt for the SQL generation call
pub const SQL_SYSTEM_PROMPT: &str = "You are an expert SQL query generator.";

/// System prompt for the insight call
pub const INSIGHT_SYSTEM_PROMPT: &str = "You are a healthcare data analyst providing insights.";

/// Rows printed in a results summary before truncating.
pub const SUMMARY_ROW_LIMIT: usize = 10;

pub fn sql_generation_prompt(user_query: &str, schema_description: &str) -> String {
    format!(
        r#"You are an expert SQL query generator for healthcare data analysis.

{schema}

INSTRUCTIONS:
1. Generate ONLY valid SQLite SQL queries based on the user's question
2. Use JOIN when data from both tables is needed
3. Use appropriate aggregations (COUNT, AVG, SUM, MAX, MIN) when needed
4. Use WHERE clauses for filtering
5. Return ONLY the SQL query, no explanations
6. Use proper column names as specified in the schema
7. For patient-specific queries, use Patient_Number for filtering
8. Always use table aliases: h1 for health_dataset_1, h2 for health_dataset_2

EXAMPLES:
User: "How many patients have abnormal blood pressure?"
SQL: SELECT COUNT(*) FROM health_dataset_1 WHERE Blood_Pressure_Abnormality = 1;

User: "What is the average physical activity for patients with high stress?"
SQL: SELECT AVG(h2.Physical_activity) FROM health_dataset_1 h1 JOIN health_dataset_2 h2 ON h1.Patient_Number = h2.Patient_Number WHERE h1.Level_of_Stress = 3;

User: "Show me patients above 60 years with BMI over 30"
SQL: SELECT Patient_Number, Age, BMI FROM health_dataset_1 WHERE Age > 60 AND BMI > 30;

Now generate SQL for this query:

User Query: {query}

SQL Query:"#,
        schema = schema_description,
        query = user_query
    )
}

/// Text form of a query result as handed to the insight call.
///
/// A single-cell result is stated directly; when its column is a count and
/// `total_patients` is known, the share of all patients is appended. Larger
/// results show at most [`SUMMARY_ROW_LIMIT`] rows.
pub fn summarize_results(results: &Table, total_patients: Option<i64>) -> String {
    if results.is_empty() {
        return "Query Results:\nNo results found".to_string();
    }

    if let Some((column, value)) = results.single_value() {
        let shown = display_value(value);
        let mut summary = format!("The query returned: {} = {}", column, shown);
        if column.to_uppercase().contains("COUNT") {
            if let (Some(total), Some(count)) = (total_patients.filter(|t| *t > 0), numeric(value)) {
                let percentage = count / total as f64 * 100.0;
                summary.push_str(&format!(
                    "\nThis represents {} out of {} total patients ({:.1}%)",
                    shown, total, percentage
                ));
            }
        }
        return summary;
    }

    if results.len() <= SUMMARY_ROW_LIMIT {
        return format!("Query Results:\n{}", results.render());
    }

    format!(
        "Query Results:\nTotal rows: {total}\nShowing first {limit} rows:\n{head}\n... (showing first {limit} of {total} total rows)",
        total = results.len(),
        limit = SUMMARY_ROW_LIMIT,
        head = results.head(SUMMARY_ROW_LIMIT).render()
    )
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn insight_prompt(user_query: &str, sql_query: &str, results_summary: &str) -> String {
    format!(
        r#"You are a healthcare data analyst. Based on the user's question and the EXACT query results, provide a clear, insightful response.

CRITICAL INSTRUCTIONS:
- Use ONLY the exact numbers from the results below
- If a count and total are provided, you may calculate the percentage
- Be precise and accurate - do not estimate or guess
- Write in a natural, professional manner

User's Question: {query}

SQL Query Executed:
{sql}

{summary}

Provide a clear, concise analysis (2-3 paragraphs) using the exact numbers above:"#,
        query = user_query,
        sql = sql_query,
        summary = results_summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema_description;
    use serde_json::json;

    #[test]
    fn test_sql_prompt_layout() {
        let prompt = sql_generation_prompt("How many smokers are there?", &schema_description());
        assert!(prompt.contains("health_dataset_1"));
        assert!(prompt.contains("8. Always use table aliases: h1 for health_dataset_1, h2 for health_dataset_2"));
        assert!(prompt.ends_with("User Query: How many smokers are there?\n\nSQL Query:"));
    }

    #[test]
    fn test_count_summary_with_percentage() {
        let table = Table::new(vec!["COUNT(*)".to_string()], vec![vec![json!(42)]]);
        let summary = summarize_results(&table, Some(200));
        assert!(summary.starts_with("The query returned: COUNT(*) = 42"));
        assert!(summary.contains("42 out of 200 total patients (21.0%)"));
    }

    #[test]
    fn test_single_value_without_count_column() {
        let table = Table::new(vec!["avg_age".to_string()], vec![vec![json!(52.5)]]);
        assert_eq!(summarize_results(&table, Some(200)), "The query returned: avg_age = 52.5");

        let count = Table::new(vec!["patient_count".to_string()], vec![vec![json!(7)]]);
        assert_eq!(summarize_results(&count, None), "The query returned: patient_count = 7");
        assert_eq!(summarize_results(&count, Some(0)), "The query returned: patient_count = 7");
    }

    #[test]
    fn test_empty_summary() {
        let table = Table::with_columns(&["Patient_Number"]);
        assert_eq!(summarize_results(&table, None), "Query Results:\nNo results found");
    }

    #[test]
    fn test_large_result_is_truncated() {
        let rows = (1..=11).map(|i| vec![json!(format!("P{:05}", i)), json!(60 + i)]).collect();
        let table = Table::new(vec!["Patient_Number".to_string(), "Age".to_string()], rows);
        let summary = summarize_results(&table, None);

        assert!(summary.contains("Total rows: 11"));
        assert!(summary.contains("Showing first 10 rows:"));
        assert!(summary.ends_with("... (showing first 10 of 11 total rows)"));
        let data_rows = summary.lines().filter(|l| l.trim_start().starts_with("P0")).count();
        assert_eq!(data_rows, 10);
        assert!(!summary.contains("P00011"));
    }

    #[test]
    fn test_small_result_is_rendered_in_full() {
        let table = Table::new(
            vec!["Sex".to_string(), "n".to_string()],
            vec![vec![json!(0), json!(980)], vec![json!(1), json!(1020)]],
        );
        let summary = summarize_results(&table, Some(2000));
        assert_eq!(summary, format!("Query Results:\n{}", table.render()));
    }

    #[test]
    fn test_insight_prompt_carries_only_summary() {
        let prompt = insight_prompt("How many?", "SELECT COUNT(*) FROM health_dataset_1;", "The query returned: COUNT(*) = 3");
        assert!(prompt.contains("User's Question: How many?"));
        assert!(prompt.contains("SQL Query Executed:\nSELECT COUNT(*) FROM health_dataset_1;"));
        assert!(prompt.contains("The query returned: COUNT(*) = 3"));
    }
}
