//! Self-correcting SQL generation loop.
//!
//! Generate → validate → execute, with failed attempts fed back into a
//! repair prompt. Validation rejections consume an attempt just like
//! execution failures, so a generator stuck emitting writes cannot spin
//! forever. The loop never mutates earlier attempts; the history it returns
//! is the audit record.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use opsdesk_ai::{Completion, extract, heuristics, prompts};
use opsdesk_core::{ExecutionResult, PolicyChunk, Query, SqlAttempt, TraceRecorder, TraceStep};
use opsdesk_store::SqliteStore;

use crate::AgentError;

/// Default attempt budget: one initial generation plus two repairs.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Keywords that end validation immediately. Matched on word boundaries so
/// column names like `updated_at` pass.
const FORBIDDEN_KEYWORDS: &[&str] = &["insert", "update", "delete", "drop", "alter", "attach"];

/// The loop's outcome: the result (or terminal error) plus the full
/// attempt history, numbered contiguously from 1.
pub struct LoopOutcome {
    pub result: Result<ExecutionResult, AgentError>,
    pub attempts: Vec<SqlAttempt>,
}

enum State {
    Generate,
    Validate(String),
    Execute(String),
    Repair,
}

/// Runs the correction loop against one store.
pub struct SqlGenerator {
    completion: Arc<dyn Completion>,
    store: Arc<SqliteStore>,
    max_retries: u32,
}

impl SqlGenerator {
    pub fn new(completion: Arc<dyn Completion>, store: Arc<SqliteStore>) -> Self {
        Self {
            completion,
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Run the loop to completion for one query.
    ///
    /// `policy_context` carries retrieved business rules into the
    /// generation prompt (hybrid pipeline); pass an empty slice otherwise.
    /// An empty result set is a successful outcome, not a failure.
    pub async fn generate_and_run(
        &self,
        query: &Query,
        policy_context: &[PolicyChunk],
        recorder: &TraceRecorder,
    ) -> LoopOutcome {
        let schema = match self.store.schema_summary() {
            Ok(schema) => schema,
            Err(err) => {
                warn!(%err, "schema summary unavailable, generating without it");
                String::new()
            }
        };

        let mut attempts: Vec<SqlAttempt> = Vec::with_capacity(self.max_retries as usize);
        let mut attempt_number: u32 = 1;
        let mut state = State::Generate;

        loop {
            state = match state {
                State::Generate => {
                    let statement = self
                        .generate(query, &schema, policy_context, &attempts)
                        .await;
                    recorder.record(
                        TraceStep::SqlGeneration,
                        json!({"attempt_number": attempt_number, "statement": statement}),
                    );
                    State::Validate(statement)
                }

                State::Validate(statement) => match validate_statement(&statement) {
                    Ok(()) => {
                        recorder.record(
                            TraceStep::SqlValidation,
                            json!({"attempt_number": attempt_number, "allowed": true}),
                        );
                        State::Execute(statement)
                    }
                    Err(reason) => {
                        recorder.record(
                            TraceStep::SqlValidation,
                            json!({
                                "attempt_number": attempt_number,
                                "allowed": false,
                                "error": reason,
                            }),
                        );
                        attempts.push(SqlAttempt {
                            attempt_number,
                            statement,
                            validation_error: Some(reason),
                            execution_error: None,
                        });
                        State::Repair
                    }
                },

                State::Execute(statement) => match self.store.run_select(&statement) {
                    Ok(result) => {
                        info!(
                            attempt = attempt_number,
                            rows = result.rows.len(),
                            "statement executed"
                        );
                        recorder.record(
                            TraceStep::SqlExecution,
                            json!({
                                "attempt_number": attempt_number,
                                "status": "success",
                                "rows": result.rows.len(),
                            }),
                        );
                        attempts.push(SqlAttempt {
                            attempt_number,
                            statement,
                            validation_error: None,
                            execution_error: None,
                        });
                        return LoopOutcome {
                            result: Ok(result),
                            attempts,
                        };
                    }
                    Err(err) => {
                        let message = err.to_string();
                        recorder.record(
                            TraceStep::SqlExecution,
                            json!({
                                "attempt_number": attempt_number,
                                "status": "error",
                                "error": message,
                            }),
                        );
                        attempts.push(SqlAttempt {
                            attempt_number,
                            statement,
                            validation_error: None,
                            execution_error: Some(message),
                        });
                        State::Repair
                    }
                },

                State::Repair => {
                    let last_error = attempts
                        .last()
                        .and_then(SqlAttempt::error)
                        .unwrap_or("unknown error")
                        .to_string();
                    if attempt_number >= self.max_retries {
                        recorder.record(
                            TraceStep::SqlRepair,
                            json!({"status": "exhausted", "attempts": attempt_number}),
                        );
                        return LoopOutcome {
                            result: Err(AgentError::RetriesExhausted {
                                attempts: attempt_number,
                                last_error,
                            }),
                            attempts,
                        };
                    }
                    attempt_number += 1;
                    recorder.record(
                        TraceStep::SqlRepair,
                        json!({"attempt_number": attempt_number, "cause": last_error}),
                    );
                    State::Generate
                }
            };
        }
    }

    /// Produce the next candidate statement. The first attempt uses the
    /// generation prompt; repairs feed the whole attempt history back. An
    /// unreachable inference service falls back to the deterministic
    /// templates rather than failing the query.
    async fn generate(
        &self,
        query: &Query,
        schema: &str,
        policy_context: &[PolicyChunk],
        attempts: &[SqlAttempt],
    ) -> String {
        let text = query.normalized();
        let prompt = if attempts.is_empty() {
            prompts::generate_sql(&text, schema, policy_context)
        } else {
            prompts::repair_sql(&text, schema, policy_context, attempts)
        };

        match self.completion.complete(&prompt).await {
            Ok(completion) => extract::extract_sql(&completion),
            Err(err) => {
                warn!(%err, "inference unavailable, using heuristic SQL");
                heuristics::heuristic_sql(&text, policy_context)
            }
        }
    }
}

/// Static safety gate, independent of the engine's own read-only mode.
///
/// Requires a single SELECT (or WITH) statement and rejects write keywords
/// anywhere in the text, including inside CTE bodies.
pub fn validate_statement(statement: &str) -> Result<(), String> {
    let trimmed = statement.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err("empty statement".to_string());
    }
    if trimmed.contains(';') {
        return Err("multiple statements are not allowed".to_string());
    }

    let lowered = trimmed.to_lowercase();
    if !(lowered.starts_with("select") || lowered.starts_with("with")) {
        return Err("not a read-only SELECT statement".to_string());
    }

    for token in lowered.split(|c: char| !c.is_ascii_alphanumeric()) {
        if FORBIDDEN_KEYWORDS.contains(&token) {
            return Err(format!("forbidden keyword: {token}"));
        }
    }
    Ok(())
}
