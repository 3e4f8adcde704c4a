//! Table - ordered columns and rows of JSON cells
//!
//! Used for raw loaded datasets and for query results alike.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names
    pub columns: Vec<String>,

    /// Row-major cells, each row as long as `columns`
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Zero-row table with the given header.
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (`row`, `column`); null when the column is absent or the row
    /// is short.
    pub fn cell(&self, row: usize, column: Option<usize>) -> &Value {
        column
            .and_then(|idx| self.rows.get(row).and_then(|r| r.get(idx)))
            .unwrap_or(&Value::Null)
    }

    /// The (column, value) pair of a one-row, one-column result.
    pub fn single_value(&self) -> Option<(&str, &Value)> {
        if self.rows.len() == 1 && self.columns.len() == 1 {
            self.rows[0].first().map(|v| (self.columns[0].as_str(), v))
        } else {
            None
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Plain-text rendering: a header line and one line per row, each column
    /// right-aligned to its widest cell.
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return "Empty table".to_string();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                (0..self.columns.len())
                    .map(|i| row.get(i).map(display_value).unwrap_or_default())
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let format_line = |values: Vec<&str>| -> String {
            values
                .iter()
                .zip(widths.iter())
                .map(|(v, w)| format!("{:>width$}", v, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
        };

        let mut lines = Vec::with_capacity(cells.len() + 1);
        lines.push(format_line(self.columns.iter().map(String::as_str).collect()));
        for row in &cells {
            lines.push(format_line(row.iter().map(String::as_str).collect()));
        }
        lines.join("\n")
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Cell text without JSON quoting; floats keep at most six decimals.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                match n.as_f64() {
                    Some(f) => format_float(f),
                    None => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

fn format_float(f: f64) -> String {
    let fixed = format!("{:.6}", f);
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// JSON number from a float; non-finite values become null.
pub fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
