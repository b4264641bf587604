//! Tabular execution results and their masked form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// The raw output of a successful statement execution.
///
/// Column order is preserved from the engine. Once produced the result is
/// never mutated — masking derives a [`MaskedResult`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ExecutionResult {
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }
}

/// An [`ExecutionResult`] with PII-bearing columns redacted.
///
/// Derived, never the canonical stored result. `masked_columns` lists which
/// columns were redacted, for the audit trail; it is omitted from the wire
/// shape when no masking was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masked_columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_round_trips_with_column_order() {
        let mut row = Row::new();
        row.insert("name".into(), json!("Alice Smith"));
        row.insert("total_spent".into(), json!(1250.0));
        let result = ExecutionResult {
            columns: vec!["name".into(), "total_spent".into()],
            rows: vec![row],
        };

        let text = serde_json::to_string(&result).unwrap();
        let parsed: ExecutionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, result);
        assert_eq!(parsed.columns, vec!["name", "total_spent"]);
    }

    #[test]
    fn masked_columns_omitted_when_empty() {
        let masked = MaskedResult {
            columns: vec!["name".into()],
            rows: Vec::new(),
            masked_columns: Vec::new(),
        };
        let value = serde_json::to_value(&masked).unwrap();
        assert!(value.get("masked_columns").is_none());
    }
}
