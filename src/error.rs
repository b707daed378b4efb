#![allow(missing_docs)]
//! Error types for the ELIZA script engine.

use thiserror::Error;

/// Result type alias using ElizaError.
pub type Result<T> = std::result::Result<T, ElizaError>;

/// Errors that can occur while compiling a script or running a session.
#[derive(Debug, Error)]
pub enum ElizaError {
    /// The raw script document is missing a field or has a field of the wrong shape.
    #[error("Script error in '{field}': {message}")]
    Script { field: String, message: String },

    /// A transform call received something other than a string.
    #[error("Input error: {0}")]
    Input(String),

    /// A chain of redirects did not terminate.
    #[error("Redirect cycle: gave up following '{keyword}' after {depth} redirects")]
    RedirectCycle { keyword: String, depth: usize },

    /// A synthesized pattern failed to compile.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ElizaError {
    /// Create a script error for the given field.
    pub fn script<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Script {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an input error.
    pub fn input<S: Into<String>>(msg: S) -> Self {
        Self::Input(msg.into())
    }

    /// Returns true for errors raised while compiling a script.
    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Script { .. } | Self::Pattern(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_names_field() {
        let err = ElizaError::script("initial", "needs to be an array");
        assert_eq!(
            err.to_string(),
            "Script error in 'initial': needs to be an array"
        );
        assert!(err.is_script_error());
    }

    #[test]
    fn test_input_error_is_not_script_error() {
        let err = ElizaError::input("expected a string (not number)");
        assert!(!err.is_script_error());
        assert!(err.to_string().contains("expected a string"));
    }
}
