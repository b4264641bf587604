//! Append-only structured trace: the audit record for one query.
//!
//! Every pipeline stage appends [`TraceEvent`]s through a [`TraceRecorder`]
//! handle passed into the pipeline call. The recorder buffers the ordered
//! events for the response envelope and optionally forwards each one to a
//! shared [`TraceSink`] (e.g. a JSONL file) as a single atomic line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Stage tags for trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    RequestRejected,
    RouteDecision,
    PolicyRetrieval,
    SqlGeneration,
    SqlValidation,
    SqlExecution,
    SqlRepair,
    ResultMasked,
    Answer,
    NoSource,
}

impl TraceStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestRejected => "request_rejected",
            Self::RouteDecision => "route_decision",
            Self::PolicyRetrieval => "policy_retrieval",
            Self::SqlGeneration => "sql_generation",
            Self::SqlValidation => "sql_validation",
            Self::SqlExecution => "sql_execution",
            Self::SqlRepair => "sql_repair",
            Self::ResultMasked => "result_masked",
            Self::Answer => "answer",
            Self::NoSource => "no_source",
        }
    }
}

/// One structured, timestamped record of a pipeline stage's outcome.
///
/// Stage-specific keys are flattened next to `step` and `timestamp`, so the
/// persisted JSONL line reads `{"step": "...", "timestamp": "...", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub step: TraceStep,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: serde_json::Map<String, Value>,
}

/// Destination for completed trace events.
///
/// Implementations must append each event as one atomic unit so concurrent
/// queries never interleave partial records.
pub trait TraceSink: Send + Sync {
    fn append(&self, event: &TraceEvent);
}

/// In-memory sink, for tests and embedded consumers.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("trace sink poisoned").clone()
    }
}

impl TraceSink for MemorySink {
    fn append(&self, event: &TraceEvent) {
        self.events
            .lock()
            .expect("trace sink poisoned")
            .push(event.clone());
    }
}

/// File sink writing one JSON record per line, append-only.
#[derive(Debug)]
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (or create) the log file in append mode.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl TraceSink for JsonlSink {
    fn append(&self, event: &TraceEvent) {
        // A sink failure must never fail the pipeline; log and drop.
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "failed to serialize trace event");
                return;
            }
        };
        let mut file = self.file.lock().expect("trace sink poisoned");
        if let Err(err) = writeln!(file, "{line}") {
            warn!(%err, "failed to append trace event");
        }
    }
}

/// Per-query trace handle.
///
/// Buffers the ordered event sequence for the response and forwards each
/// event to the shared sink, if any. Events are appended in execution order
/// and never reordered or removed.
#[derive(Clone)]
pub struct TraceRecorder {
    events: Arc<Mutex<Vec<TraceEvent>>>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            sink: None,
        }
    }

    pub fn with_sink(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            sink: Some(sink),
        }
    }

    /// Append one event. `detail` should be a JSON object; any other value
    /// is stored under a `"detail"` key.
    pub fn record(&self, step: TraceStep, detail: Value) {
        let detail = match detail {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("detail".into(), other);
                map
            }
        };
        let event = TraceEvent {
            step,
            timestamp: Utc::now(),
            detail,
        };
        debug!(step = step.as_str(), "trace");
        if let Some(sink) = &self.sink {
            sink.append(&event);
        }
        self.events
            .lock()
            .expect("trace recorder poisoned")
            .push(event);
    }

    /// The ordered event sequence recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("trace recorder poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("trace recorder poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}
