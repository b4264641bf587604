//! Storage layer: read-only SQLite execution and the policy document corpus.

mod error;
pub use error::StoreError;

mod sqlite;
pub use sqlite::{MAX_RESULT_ROWS, SqliteStore};

mod corpus;
pub use corpus::PolicyCorpus;
