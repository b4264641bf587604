//! The orchestrator: guardrail, router, and the three answer pipelines.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use opsdesk_ai::{Completion, heuristics, prompts};
use opsdesk_core::{
    Pipeline, PolicyChunk, Query, QueryResponse, Response, ResultPayload, TraceRecorder,
    TraceSink, TraceStep,
};
use opsdesk_store::{PolicyCorpus, SqliteStore};

use crate::{AgentError, Router, SqlGenerator, guardrail};

/// Tunables for one agent instance.
#[derive(Debug, Clone, Copy)]
pub struct AgentConfig {
    /// Attempt budget for the SQL correction loop.
    pub max_retries: u32,
    /// How many policy chunks retrieval returns per query.
    pub top_k_chunks: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            top_k_chunks: 3,
        }
    }
}

/// The query agent. One instance serves many queries; each call gets its
/// own trace recorder, so concurrent queries never share trace state.
pub struct Agent {
    router: Router,
    generator: SqlGenerator,
    completion: Arc<dyn Completion>,
    corpus: Option<Arc<PolicyCorpus>>,
    sink: Option<Arc<dyn TraceSink>>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(store: Arc<SqliteStore>, completion: Arc<dyn Completion>) -> Self {
        let config = AgentConfig::default();
        Self {
            router: Router::new(completion.clone()),
            generator: SqlGenerator::new(completion.clone(), store)
                .with_max_retries(config.max_retries),
            completion,
            corpus: None,
            sink: None,
            config,
        }
    }

    /// Attach the policy corpus. Without one, docs retrieval degrades to an
    /// explicit "no policy context" outcome instead of failing.
    pub fn with_corpus(mut self, corpus: Arc<PolicyCorpus>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Forward every trace event to a shared sink (e.g. a JSONL file).
    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.generator = self.generator.with_max_retries(config.max_retries);
        self.config = config;
        self
    }

    /// Answer one natural-language query.
    ///
    /// Never returns an error: every failure mode becomes a structured
    /// payload, and the trace always explains what happened.
    pub async fn process(&self, text: &str) -> QueryResponse {
        let query = Query::new(text);
        let recorder = match &self.sink {
            Some(sink) => TraceRecorder::with_sink(sink.clone()),
            None => TraceRecorder::new(),
        };
        info!(query = %query.normalized(), "processing query");

        let response = match self.run(&query, &recorder).await {
            Ok(response) => response,
            Err(AgentError::RequestRejected(reason)) => Response::message(format!(
                "I can't help with that: {reason}."
            )),
            Err(err @ AgentError::RetriesExhausted { .. }) => {
                Response::result(ResultPayload::error(err.to_string()))
            }
        };

        QueryResponse {
            response,
            trace: recorder.events(),
        }
    }

    async fn run(
        &self,
        query: &Query,
        recorder: &TraceRecorder,
    ) -> Result<Response, AgentError> {
        // The guardrail sees the request before anything else does; a
        // refused query produces exactly one trace event and touches no
        // data source.
        let screening = guardrail::screen_request(query);
        if !screening.allowed {
            let reason = screening
                .reason
                .unwrap_or_else(|| "request was refused by the privacy guardrail".to_string());
            recorder.record(TraceStep::RequestRejected, json!({"reason": reason}));
            return Err(AgentError::RequestRejected(reason));
        }

        let decision = self.router.route(query, recorder).await;
        match decision.pipeline() {
            Pipeline::Neither => {
                recorder.record(TraceStep::NoSource, json!({}));
                Ok(Response::message(
                    "This request doesn't need a data lookup. Ask about business \
                     data or policies and I'll query them for you.",
                ))
            }
            Pipeline::SqlOnly => self.run_sql(query, &[], "sql", recorder).await,
            Pipeline::DocsOnly => self.run_docs(query, recorder).await,
            Pipeline::Hybrid => {
                let chunks = self.retrieve(query, recorder);
                self.run_sql(query, &chunks, "hybrid", recorder).await
            }
        }
    }

    async fn run_sql(
        &self,
        query: &Query,
        policy_context: &[PolicyChunk],
        mode: &str,
        recorder: &TraceRecorder,
    ) -> Result<Response, AgentError> {
        let outcome = self
            .generator
            .generate_and_run(query, policy_context, recorder)
            .await;
        let result = outcome.result?;

        let masked = guardrail::mask(&result);
        if !masked.masked_columns.is_empty() {
            recorder.record(
                TraceStep::ResultMasked,
                json!({"masked_columns": masked.masked_columns}),
            );
        }
        recorder.record(
            TraceStep::Answer,
            json!({"mode": mode, "rows": masked.rows.len()}),
        );
        Ok(Response::result(ResultPayload::Table(masked)))
    }

    async fn run_docs(
        &self,
        query: &Query,
        recorder: &TraceRecorder,
    ) -> Result<Response, AgentError> {
        let chunks = self.retrieve(query, recorder);
        if chunks.is_empty() {
            recorder.record(TraceStep::Answer, json!({"mode": "docs", "chunks": 0}));
            return Ok(Response::message(
                "No policy context found for that question.",
            ));
        }

        let prompt = prompts::answer_from_docs(&query.normalized(), &chunks);
        let answer = match self.completion.complete(&prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(err) => {
                warn!(%err, "inference unavailable, answering from top chunk");
                heuristics::answer_from_chunks(&chunks)
            }
        };

        recorder.record(
            TraceStep::Answer,
            json!({"mode": "docs", "chunks": chunks.len()}),
        );
        Ok(Response::message(answer))
    }

    /// Rank policy chunks for the query. A missing corpus is recorded as an
    /// empty retrieval, not an error; the pipelines degrade from there.
    fn retrieve(&self, query: &Query, recorder: &TraceRecorder) -> Vec<PolicyChunk> {
        let chunks = match &self.corpus {
            Some(corpus) => corpus.retrieve(&query.normalized(), self.config.top_k_chunks),
            None => {
                warn!("no policy corpus configured");
                Vec::new()
            }
        };
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        recorder.record(
            TraceStep::PolicyRetrieval,
            json!({"chunks": chunks.len(), "ids": ids}),
        );
        chunks
    }
}
