pub mod attempt;
pub mod chunk;
pub mod query;
pub mod response;
pub mod result;
pub mod route;
pub mod trace;

pub use attempt::SqlAttempt;
pub use chunk::PolicyChunk;
pub use query::Query;
pub use response::{QueryResponse, Response, ResultPayload};
pub use result::{ExecutionResult, MaskedResult, Row};
pub use route::{DecisionSource, Pipeline, RoutingDecision};
pub use trace::{JsonlSink, MemorySink, TraceEvent, TraceRecorder, TraceSink, TraceStep};
