use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of the inference capability.
///
/// None of these are fatal to a pipeline: every call site degrades to a
/// deterministic fallback instead of surfacing the error to the end user.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference service unavailable: {0}")]
    Unavailable(String),

    #[error("inference service returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("inference service returned an empty completion")]
    EmptyCompletion,
}

/// The inference capability: one method, bounded timeout, explicit failure.
///
/// Implementations must enforce their own wall-clock bound; callers treat
/// any error as "fall back to heuristics", never as a pipeline failure.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError>;
}
