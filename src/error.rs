//! Error types for cuehistory.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Value-predicate failures are deliberately absent:
//! they are swallowed as non-matches and never surface here.

use thiserror::Error;

/// Validation errors raised while constructing paths, patterns or config.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A concrete path was malformed or contained a wildcard.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path text.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A pattern failed to compile.
    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A path or pattern exceeded `max_path_depth`.
    #[error("Path '{path}' has {depth} segments, maximum is {max_depth}")]
    PathTooDeep {
        /// The offending path or pattern.
        path: String,
        /// Its segment count.
        depth: usize,
        /// The configured limit.
        max_depth: usize,
    },

    /// A configuration value was out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which setting and why.
        reason: String,
    },
}

/// Execution errors raised by history operations.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A bounded wait elapsed without a matching event.
    #[error("Wait timed out after {duration_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        duration_ms: u64,
    },

    /// An internal channel lost its other end.
    #[error("Channel disconnected: {path}")]
    Disconnected {
        /// Which channel.
        path: String,
    },

    /// The pending-matcher registry is full.
    #[error("Too many pending waiters (max: {max})")]
    WaiterLimitExceeded {
        /// The configured limit.
        max: usize,
    },

    /// The operation exists but is not implemented.
    #[error("Operation '{operation}' is not supported yet")]
    Unsupported {
        /// The operation's name.
        operation: &'static str,
    },

    /// A delivered waiter's re-query found nothing. Fatal.
    #[error("Sync error: delivered but no event found for '{pattern}' after {time}")]
    SyncProtocolViolation {
        /// The waiter's pattern.
        pattern: String,
        /// The waiter's logical time.
        time: String,
    },
}

/// Top-level error type for cuehistory.
#[derive(Debug, Error)]
pub enum CueError {
    /// Bad input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An operation failed at runtime.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// A broken internal invariant, such as a poisoned lock.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl CueError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the delivery/ordering invariant was broken.
    ///
    /// Fatal errors must never be retried or swallowed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(e, ExecutionError::SyncProtocolViolation { .. }),
            Self::Internal { .. } => true,
            Self::Validation(_) => false,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false, // Validation errors won't change on retry
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. } | ExecutionError::WaiterLimitExceeded { .. }
            ),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for cuehistory operations.
pub type CueResult<T> = Result<T, CueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_pattern() {
        let err = ValidationError::InvalidPattern {
            pattern: "/a/b**".to_string(),
            reason: "'**' must be a whole segment".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/a/b**"));
        assert!(msg.contains("whole segment"));
    }

    #[test]
    fn test_validation_error_too_deep() {
        let err = ValidationError::PathTooDeep {
            path: "/a/b/c".to_string(),
            depth: 3,
            max_depth: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains("3 segments"));
        assert!(msg.contains("maximum is 2"));
    }

    #[test]
    fn test_execution_error_timeout() {
        let err = ExecutionError::Timeout { duration_ms: 250 };
        assert!(format!("{err}").contains("250ms"));
    }

    #[test]
    fn test_execution_error_unsupported() {
        let err = ExecutionError::Unsupported {
            operation: "wait_for_all_of",
        };
        assert!(format!("{err}").contains("wait_for_all_of"));
    }

    #[test]
    fn test_cue_error_from_validation() {
        let err: CueError = ValidationError::InvalidConfig {
            reason: "zero".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_cue_error_sync_violation_is_fatal() {
        let err: CueError = ExecutionError::SyncProtocolViolation {
            pattern: "/x".to_string(),
            time: "t=1".to_string(),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cue_error_retryable() {
        let timeout: CueError = ExecutionError::Timeout { duration_ms: 10 }.into();
        assert!(timeout.is_retryable());

        let limit: CueError = ExecutionError::WaiterLimitExceeded { max: 1 }.into();
        assert!(limit.is_retryable());

        let internal = CueError::internal("poisoned");
        assert!(internal.is_internal());
        assert!(internal.is_fatal());
        assert!(!internal.is_retryable());
    }
}
