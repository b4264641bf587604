//! PII guardrail: request screening and result masking.
//!
//! Two enforcement points. Screening runs before any routing or data access
//! and rejects queries that explicitly ask for raw contact details. Masking
//! runs on every execution result and redacts sensitive column values, so a
//! statement that slips contact columns past screening still never leaks
//! them to the caller.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use opsdesk_core::{ExecutionResult, MaskedResult, Query};

/// Placeholder written over every value in a masked column.
pub const REDACTION_TOKEN: &str = "[REDACTED]";

/// Outcome of screening one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screening {
    pub allowed: bool,
    /// Why the request was refused. Names the category of data, never the
    /// matched text, so the trace itself stays free of sensitive detail.
    pub reason: Option<String>,
}

fn request_terms() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(e[-_\s]?mails?|phones?|phone[-_\s]numbers?|address(es)?|pii)\b")
            .expect("static regex")
    })
}

fn sensitive_column() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)e[-_]?mail|phone|address").expect("static regex"))
}

/// Screen a request before routing.
///
/// A query that names a raw contact field (email, phone, address) or asks
/// for PII outright is refused. Screening a query twice gives the same
/// answer; there is no state.
pub fn screen_request(query: &Query) -> Screening {
    if request_terms().is_match(&query.text) {
        Screening {
            allowed: false,
            reason: Some(
                "request asks for raw customer contact details; aggregated or \
                 de-identified results are available instead"
                    .to_string(),
            ),
        }
    } else {
        Screening {
            allowed: true,
            reason: None,
        }
    }
}

/// Whether a result column carries contact data, by name. Covers common
/// aliases (`e_mail`, `phone_number`, `shipping_address`).
pub fn is_sensitive_column(name: &str) -> bool {
    sensitive_column().is_match(name)
}

/// Redact every value in sensitive columns, preserving row and column order.
///
/// Masking is idempotent: a redaction token is just another string value, so
/// masking a masked result changes nothing.
pub fn mask(result: &ExecutionResult) -> MaskedResult {
    let masked_columns: Vec<String> = result
        .columns
        .iter()
        .filter(|name| is_sensitive_column(name))
        .cloned()
        .collect();

    let rows = result
        .rows
        .iter()
        .map(|row| {
            let mut masked = row.clone();
            for column in &masked_columns {
                if masked.contains_key(column) {
                    masked.insert(column.clone(), Value::String(REDACTION_TOKEN.into()));
                }
            }
            masked
        })
        .collect();

    MaskedResult {
        columns: result.columns.clone(),
        rows,
        masked_columns,
    }
}
