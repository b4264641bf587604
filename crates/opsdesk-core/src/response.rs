//! The caller-facing response envelope.

use serde::{Deserialize, Serialize};

use crate::result::MaskedResult;
use crate::trace::TraceEvent;

/// Everything a caller gets back for one query: the answer payload plus the
/// ordered audit trace for that call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: Response,
    pub trace: Vec<TraceEvent>,
}

/// The answer payload: either a plain message (informational, no-data-source,
/// or rejection) or a tabular/error result with an optional message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Message {
        message: String,
    },
    Result {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        result: ResultPayload,
    },
}

impl Response {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message {
            message: text.into(),
        }
    }

    pub fn result(payload: ResultPayload) -> Self {
        Self::Result {
            message: None,
            result: payload,
        }
    }
}

/// A result is either the (masked) table or a structured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Table(MaskedResult),
    Error { error: String },
}

impl ResultPayload {
    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { error: text.into() }
    }
}
