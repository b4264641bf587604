//! Query router: deterministic policy-term fast path plus a model
//! classifier, merged into one immutable [`RoutingDecision`].

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use opsdesk_ai::{Completion, extract, prompts};
use opsdesk_core::{DecisionSource, Query, RoutingDecision, TraceRecorder, TraceStep};

/// Policy-indicative vocabulary for the deterministic fast path. A hit
/// forces `requires_policy` on regardless of what the classifier says.
pub const POLICY_TERMS: &[&str] = &[
    "policy",
    "policies",
    "rule",
    "guideline",
    "allowed",
    "compliance",
    "refund",
    "restocking",
    "eligib",
];

/// Routes one query to its pipeline.
pub struct Router {
    completion: Arc<dyn Completion>,
}

impl Router {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }

    /// Decide which data sources the query needs and record one
    /// `route_decision` trace event.
    ///
    /// The classifier is consulted for both dimensions; an unparseable or
    /// failed answer defaults to `true`, since over-routing costs a little
    /// latency while under-routing loses the answer. The policy dimension
    /// additionally ORs in the term fast path, and `source` is `rule`
    /// whenever that fast path fired.
    pub async fn route(&self, query: &Query, recorder: &TraceRecorder) -> RoutingDecision {
        let decision = if query.has_substance() {
            self.classify(query).await
        } else {
            RoutingDecision {
                requires_sql: false,
                requires_policy: false,
                source: DecisionSource::Rule,
                rationale: "query contains no answerable content".to_string(),
            }
        };

        recorder.record(
            TraceStep::RouteDecision,
            json!({
                "requires_sql": decision.requires_sql,
                "requires_policy": decision.requires_policy,
                "source": decision.source.as_str(),
                "rationale": decision.rationale,
            }),
        );
        decision
    }

    async fn classify(&self, query: &Query) -> RoutingDecision {
        let text = query.normalized();
        let rule_policy = policy_term_hit(&text);

        let (requires_sql, sql_note) = self.ask(&prompts::needs_database(&text)).await;
        let (model_policy, policy_note) = if rule_policy {
            // Fast path already settled this dimension; skip the call.
            (true, None)
        } else {
            self.ask(&prompts::needs_policy(&text)).await
        };

        let mut rationale = if rule_policy {
            "policy-indicative term matched".to_string()
        } else {
            "classifier decision".to_string()
        };
        for note in [sql_note, policy_note].into_iter().flatten() {
            rationale.push_str("; ");
            rationale.push_str(&note);
        }

        RoutingDecision {
            requires_sql,
            requires_policy: rule_policy || model_policy,
            source: if rule_policy {
                DecisionSource::Rule
            } else {
                DecisionSource::Model
            },
            rationale,
        }
    }

    /// One yes/no classifier call. Returns the answer plus a rationale note
    /// when the conservative default was applied instead of a real answer.
    async fn ask(&self, prompt: &str) -> (bool, Option<String>) {
        match self.completion.complete(prompt).await {
            Ok(answer) => match extract::parse_yes_no(&answer) {
                Some(value) => (value, None),
                None => (
                    true,
                    Some("unparseable classifier answer, defaulting to yes".to_string()),
                ),
            },
            Err(err) => {
                warn!(%err, "classifier unavailable, defaulting to yes");
                (true, Some(format!("classifier unavailable ({err})")))
            }
        }
    }
}

fn policy_term_hit(text: &str) -> bool {
    let lowered = text.to_lowercase();
    POLICY_TERMS.iter().any(|term| lowered.contains(term))
}
