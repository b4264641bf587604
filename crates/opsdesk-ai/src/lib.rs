//! Inference layer: the completion capability, an OpenAI-compatible HTTP
//! client, prompt construction, and deterministic fallbacks.
//!
//! Everything that talks to the inference service goes through the single
//! [`Completion`] trait, so the router, SQL generator, and docs synthesizer
//! share one timeout/fallback contract instead of duplicating it.

mod completion;
pub use completion::{Completion, InferenceError};

mod http;
pub use http::ChatClient;

pub mod extract;
pub mod heuristics;
pub mod prompts;
