//! Domain-specific errors.

use thiserror::Error;

/// Failures raised while expanding or compiling glob patterns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("unbalanced '{brace}' at byte {position} in pattern '{pattern}'")]
    Malformed {
        pattern: String,
        position: usize,
        brace: char,
    },
    #[error("invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

impl PatternError {
    /// The pattern that caused the failure, as written by the user.
    pub fn pattern(&self) -> &str {
        match self {
            PatternError::Malformed { pattern, .. } | PatternError::InvalidGlob { pattern, .. } => {
                pattern
            }
        }
    }
}
