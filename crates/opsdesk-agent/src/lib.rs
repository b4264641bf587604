//! Query-orchestration pipeline: PII guardrail, rule+model router,
//! self-correcting SQL generation, and the agent that ties them together.
//!
//! The flow for one query is fixed: screen, route, then exactly one of the
//! SQL, docs, or hybrid pipelines (or a no-source message). Every stage
//! appends to the query's trace, which travels back inside the response.

mod error;
pub use error::AgentError;

pub mod guardrail;
pub use guardrail::{REDACTION_TOKEN, Screening, mask, screen_request};

mod router;
pub use router::{POLICY_TERMS, Router};

mod sqlgen;
pub use sqlgen::{DEFAULT_MAX_RETRIES, LoopOutcome, SqlGenerator, validate_statement};

mod agent;
pub use agent::{Agent, AgentConfig};
