//! Result rows to conversational text

use std::fmt::Write;

use serde_json::Value;

use crate::database::Row;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct ResultFormatter {
    preview_rows: usize,
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_ROWS)
    }
}

impl ResultFormatter {
    pub fn new(preview_rows: usize) -> Self {
        Self { preview_rows }
    }

    /// Explanation followed by a row count and a short preview.
    ///
    /// Each row is rendered with its own keys, so ragged result sets are fine.
    pub fn format(&self, explanation: &str, rows: &[Row]) -> String {
        let mut text = explanation.trim_end().to_string();

        if rows.is_empty() {
            text.push_str("\n\nNo results found.");
            return text;
        }

        let total = rows.len();
        let noun = if total == 1 { "result" } else { "results" };
        let _ = write!(text, "\n\nFound {} {}.", total, noun);

        let shown = total.min(self.preview_rows);
        for (index, row) in rows.iter().take(shown).enumerate() {
            let _ = write!(text, "\n{}. {}", index + 1, render_row(row));
        }
        if shown > 0 && shown < total {
            let _ = write!(text, "\n(showing first {} of {})", shown, total);
        }

        text
    }
}

fn render_row(row: &Row) -> String {
    if row.is_empty() {
        return "(empty row)".to_string();
    }

    row.iter()
        .map(|(column, value)| format!("{}: {}", column, render_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
