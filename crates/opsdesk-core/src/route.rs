//! Routing decisions: which data sources a query needs.

use serde::{Deserialize, Serialize};

/// Which signal produced the decision.
///
/// `Rule` means the deterministic fast path fired; `Model` means the
/// probabilistic classifier (or its conservative fallback) decided alone.
/// Recorded explicitly so the audit trail never has to be inferred from
/// control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Rule,
    Model,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Model => "model",
        }
    }
}

/// The routing decision for one query. Produced exactly once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub requires_sql: bool,
    pub requires_policy: bool,
    pub source: DecisionSource,
    pub rationale: String,
}

/// The pipeline a decision selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    SqlOnly,
    DocsOnly,
    Hybrid,
    Neither,
}

impl RoutingDecision {
    pub fn pipeline(&self) -> Pipeline {
        match (self.requires_sql, self.requires_policy) {
            (true, true) => Pipeline::Hybrid,
            (true, false) => Pipeline::SqlOnly,
            (false, true) => Pipeline::DocsOnly,
            (false, false) => Pipeline::Neither,
        }
    }
}
