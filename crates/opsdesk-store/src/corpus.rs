//! Policy document corpus: load, chunk, and rank by lexical relevance.
//!
//! The corpus is a single markdown document chunked on heading boundaries.
//! Chunks are immutable between refreshes; retrieval ranks them per query
//! and never mutates the corpus. Refresh re-chunks from the current file
//! state under a write lock, so readers see either the old or new corpus,
//! never a partial one.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::info;

use opsdesk_core::PolicyChunk;

use crate::StoreError;

/// Minimum term length considered by the lexical scorer. Shorter tokens
/// ("a", "of", "is") carry no signal and would flatten the ranking.
const MIN_TERM_LEN: usize = 3;

/// The policy corpus, shared read-only between queries.
#[derive(Debug)]
pub struct PolicyCorpus {
    path: Option<PathBuf>,
    source_document: String,
    chunks: RwLock<Vec<PolicyChunk>>,
}

impl PolicyCorpus {
    /// Load the corpus from a markdown file.
    ///
    /// A missing or unreadable file is the only fatal condition
    /// (`PolicyUnavailable`); retrieval itself never fails.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| StoreError::PolicyUnavailable(format!("{}: {err}", path.display())))?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let chunks = chunk_document(&source, &text);
        info!(chunks = chunks.len(), source = %source, "loaded policy corpus");
        Ok(Self {
            path: Some(path.to_path_buf()),
            source_document: source,
            chunks: RwLock::new(chunks),
        })
    }

    /// Build a corpus from in-memory text (tests, embedded defaults).
    pub fn from_text(source: &str, text: &str) -> Self {
        Self {
            path: None,
            source_document: source.to_string(),
            chunks: RwLock::new(chunk_document(source, text)),
        }
    }

    /// Return up to `k` chunks relevant to `topic`, best first.
    ///
    /// Ranking is lexical term overlap; ties break on chunk order, so
    /// identical input always yields identical output. Chunks with no
    /// overlap are not returned, and an empty result is not an error.
    pub fn retrieve(&self, topic: &str, k: usize) -> Vec<PolicyChunk> {
        let query_terms = terms(topic);
        if query_terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let chunks = self.chunks.read().expect("corpus lock poisoned");
        let mut scored: Vec<(usize, &PolicyChunk)> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = overlap_score(&query_terms, &chunk.text);
                (score > 0).then_some((score, chunk))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.order.cmp(&b.1.order)));
        scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect()
    }

    /// Re-chunk from the current document state. Serialized against readers;
    /// in-memory corpora keep their existing chunks.
    pub fn refresh(&self) -> Result<usize, StoreError> {
        let Some(path) = &self.path else {
            return Ok(self.chunk_count());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|err| StoreError::PolicyUnavailable(format!("{}: {err}", path.display())))?;
        let fresh = chunk_document(&self.source_document, &text);
        let count = fresh.len();
        *self.chunks.write().expect("corpus lock poisoned") = fresh;
        info!(chunks = count, "refreshed policy corpus");
        Ok(count)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().expect("corpus lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0
    }
}

/// Split a markdown document into ordered, non-overlapping chunks on heading
/// boundaries. A document without headings becomes a single chunk.
fn chunk_document(source: &str, text: &str) -> Vec<PolicyChunk> {
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim_start().starts_with('#') && !current.trim().is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current);
    }

    sections
        .into_iter()
        .enumerate()
        .map(|(order, section)| PolicyChunk {
            id: format!("{source}#{order}"),
            source_document: source.to_string(),
            text: section.trim().to_string(),
            order,
        })
        .collect()
}

/// Distinct lowercase terms of at least [`MIN_TERM_LEN`] characters.
fn terms(text: &str) -> Vec<String> {
    let mut out: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TERM_LEN)
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Number of query terms present in the chunk text.
fn overlap_score(query_terms: &[String], chunk_text: &str) -> usize {
    let lowered = chunk_text.to_lowercase();
    query_terms
        .iter()
        .filter(|term| lowered.contains(term.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICIES: &str = "\
# Company Policies

## VIP Customers
A customer is VIP when they spent over $1000 in the last 12 months.
VIP customers receive free shipping on all orders.

## Refund Policy
Refunds are accepted within 30 days of delivery.
A 10% restocking fee applies to opened items.

## Shipping Rules
Standard shipping takes 3-5 business days.
Orders over $100 ship free.
";

    fn corpus() -> PolicyCorpus {
        PolicyCorpus::from_text("policies.md", POLICIES)
    }

    #[test]
    fn chunks_split_on_headings_in_order() {
        let corpus = corpus();
        assert_eq!(corpus.chunk_count(), 4);
        let all = corpus.retrieve("policies customers refund shipping", 10);
        assert!(all.iter().all(|c| c.source_document == "policies.md"));
    }

    #[test]
    fn orders_are_contiguous_from_zero() {
        let chunks = chunk_document("doc.md", POLICIES);
        let orders: Vec<usize> = chunks.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
        assert_eq!(chunks[0].id, "doc.md#0");
    }

    #[test]
    fn refund_question_ranks_refund_chunk_first() {
        let top = corpus().retrieve("What is our refund policy?", 2);
        assert!(!top.is_empty());
        assert!(top[0].text.contains("Refund Policy"));
    }

    #[test]
    fn vip_question_ranks_vip_chunk_first() {
        let top = corpus().retrieve("How is a VIP customer defined?", 1);
        assert_eq!(top.len(), 1);
        assert!(top[0].text.contains("VIP"));
    }

    #[test]
    fn retrieval_is_deterministic() {
        let corpus = corpus();
        let a = corpus.retrieve("shipping refund", 3);
        let b = corpus.retrieve("shipping refund", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn no_overlap_returns_empty() {
        assert!(corpus().retrieve("quantum chromodynamics", 3).is_empty());
        assert!(corpus().retrieve("", 3).is_empty());
    }

    #[test]
    fn document_without_headings_is_one_chunk() {
        let corpus = PolicyCorpus::from_text("flat.md", "just one paragraph of rules");
        assert_eq!(corpus.chunk_count(), 1);
    }

    #[test]
    fn missing_file_is_policy_unavailable() {
        let err = PolicyCorpus::load(Path::new("/nonexistent/policies.md")).unwrap_err();
        assert!(matches!(err, StoreError::PolicyUnavailable(_)));
    }

    #[test]
    fn refresh_rechunks_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("policies.md");
        std::fs::write(&path, "# One\nfirst rule\n").unwrap();

        let corpus = PolicyCorpus::load(&path).unwrap();
        assert_eq!(corpus.chunk_count(), 1);

        std::fs::write(&path, "# One\nfirst rule\n# Two\nsecond rule\n").unwrap();
        assert_eq!(corpus.refresh().unwrap(), 2);
        assert_eq!(corpus.chunk_count(), 2);
    }
}
