//! Policy document chunks.

use serde::{Deserialize, Serialize};

/// An ordered, non-overlapping slice of the policy corpus.
///
/// Chunks are produced once at load/refresh time and treated as immutable;
/// relevance ranking is computed per query and never stored on the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyChunk {
    pub id: String,
    pub source_document: String,
    pub text: String,
    /// Position in the source document, used as the deterministic tie-break
    /// when relevance scores are equal.
    pub order: usize,
}
