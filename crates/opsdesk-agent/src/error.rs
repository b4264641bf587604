use thiserror::Error;

/// Terminal pipeline outcomes that are reported to the caller as structured
/// payloads rather than crashing the query.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The guardrail refused the request before any routing or data access.
    #[error("{0}")]
    RequestRejected(String),

    /// The SQL correction loop spent its whole attempt budget.
    #[error("query failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}
