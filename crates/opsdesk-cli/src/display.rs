//! Terminal rendering for query responses.
//!
//! Tables are fixed-width with column headers; masked columns are flagged
//! below the table so redactions are visible at a glance.

use opsdesk_core::{MaskedResult, QueryResponse, Response, ResultPayload, TraceEvent};
use serde_json::Value;

const MAX_CELL_WIDTH: usize = 40;

/// Render the answer payload for a terminal.
pub fn render(response: &QueryResponse) -> String {
    match &response.response {
        Response::Message { message } => message.clone(),
        Response::Result { message, result } => {
            let mut out = String::new();
            if let Some(message) = message {
                out.push_str(message);
                out.push('\n');
            }
            match result {
                ResultPayload::Table(table) => out.push_str(&render_table(table)),
                ResultPayload::Error { error } => {
                    out.push_str(&format!("query failed: {error}"));
                }
            }
            out
        }
    }
}

/// One line per trace event: step tag plus its detail keys.
pub fn render_trace(trace: &[TraceEvent]) -> String {
    let mut out = String::new();
    for event in trace {
        out.push_str(event.step.as_str());
        for (key, value) in &event.detail {
            out.push_str(&format!(" {key}={}", cell(value)));
        }
        out.push('\n');
    }
    out
}

fn render_table(table: &MaskedResult) -> String {
    if table.rows.is_empty() {
        return "(no rows)".to_string();
    }

    let widths: Vec<usize> = table
        .columns
        .iter()
        .map(|column| {
            let data = table
                .rows
                .iter()
                .map(|row| row.get(column).map(|v| cell(v).len()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            column.len().max(data).min(MAX_CELL_WIDTH)
        })
        .collect();

    let mut out = String::new();
    for (column, &width) in table.columns.iter().zip(&widths) {
        out.push_str(&format!("{column:<width$}  "));
    }
    out.push('\n');
    for &width in &widths {
        out.push_str(&"-".repeat(width));
        out.push_str("  ");
    }
    out.push('\n');

    for row in &table.rows {
        for (column, &width) in table.columns.iter().zip(&widths) {
            let text = row.get(column).map(cell).unwrap_or_default();
            out.push_str(&format!("{:<width$}  ", truncate(&text)));
        }
        out.push('\n');
    }

    if !table.masked_columns.is_empty() {
        out.push_str(&format!("masked: {}\n", table.masked_columns.join(", ")));
    }
    out.push_str(&format!("({} rows)", table.rows.len()));
    out
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        return text.to_string();
    }
    let kept: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_core::Row;
    use serde_json::json;

    fn sample() -> MaskedResult {
        let mut row = Row::new();
        row.insert("name".into(), json!("Alice Smith"));
        row.insert("email".into(), json!("[REDACTED]"));
        row.insert("total_spent".into(), json!(155.0));
        MaskedResult {
            columns: vec!["name".into(), "email".into(), "total_spent".into()],
            rows: vec![row],
            masked_columns: vec!["email".into()],
        }
    }

    #[test]
    fn table_lists_masked_columns() {
        let text = render_table(&sample());
        assert!(text.contains("Alice Smith"));
        assert!(text.contains("[REDACTED]"));
        assert!(text.contains("masked: email"));
        assert!(text.contains("(1 rows)"));
    }

    #[test]
    fn empty_table_renders_placeholder() {
        let table = MaskedResult {
            columns: vec!["name".into()],
            rows: Vec::new(),
            masked_columns: Vec::new(),
        };
        assert_eq!(render_table(&table), "(no rows)");
    }

    #[test]
    fn message_renders_verbatim() {
        let response = QueryResponse {
            response: Response::message("No policy context found."),
            trace: Vec::new(),
        };
        assert_eq!(render(&response), "No policy context found.");
    }

    #[test]
    fn error_result_names_cause() {
        let response = QueryResponse {
            response: Response::result(ResultPayload::error("no such column: vip")),
            trace: Vec::new(),
        };
        assert!(render(&response).contains("no such column: vip"));
    }
}
