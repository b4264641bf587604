//! SQL correction-loop attempts.

use serde::{Deserialize, Serialize};

/// One pass through the generate/validate/execute cycle.
///
/// Attempts are append-only and numbered contiguously from 1, bounded by the
/// loop's retry budget. The loop terminates on the first attempt with
/// neither error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlAttempt {
    pub attempt_number: u32,
    pub statement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
}

impl SqlAttempt {
    pub fn is_success(&self) -> bool {
        self.validation_error.is_none() && self.execution_error.is_none()
    }

    /// The error that ended this attempt, if any.
    pub fn error(&self) -> Option<&str> {
        self.validation_error
            .as_deref()
            .or(self.execution_error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_neither_error() {
        let attempt = SqlAttempt {
            attempt_number: 1,
            statement: "SELECT 1".into(),
            validation_error: None,
            execution_error: None,
        };
        assert!(attempt.is_success());
        assert!(attempt.error().is_none());
    }

    #[test]
    fn validation_error_wins_over_execution() {
        let attempt = SqlAttempt {
            attempt_number: 2,
            statement: "DROP TABLE x".into(),
            validation_error: Some("not a read-only statement".into()),
            execution_error: None,
        };
        assert!(!attempt.is_success());
        assert_eq!(attempt.error(), Some("not a read-only statement"));
    }
}
