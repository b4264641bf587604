use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not a read-only SELECT statement")]
    NotSelect,

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("policy corpus unavailable: {0}")]
    PolicyUnavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the SQL correction loop can hope to repair the statement.
    ///
    /// Engine-reported errors (bad column, syntax) carry feedback the
    /// generator can act on; policy/IO failures do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotSelect | Self::MultipleStatements | Self::Sqlite(_)
        )
    }
}
