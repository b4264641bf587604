//! Incoming user queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw user question, immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Query {
    /// Wrap raw user text, stamping the arrival time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// Whether the query contains anything answerable at all.
    ///
    /// Empty input or input with no letters or digits (e.g. `"!!!???"`)
    /// routes to neither data source.
    pub fn has_substance(&self) -> bool {
        self.text.trim().chars().any(char::is_alphanumeric)
    }

    /// Query text with runs of whitespace collapsed, for prompting and
    /// deterministic term matching.
    pub fn normalized(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
