//! Unified error types for the relia workspace.
//!
//! Domain-specific error types (topology, sweep) convert into [`ReliaError`]
//! for uniform handling at API boundaries.

use thiserror::Error;

/// Unified error type for relia operations.
#[derive(Error, Debug)]
pub enum ReliaError {
    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network structure errors
    #[error("Network error: {0}")]
    Network(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ReliaError.
pub type ReliaResult<T> = Result<T, ReliaError>;

impl From<anyhow::Error> for ReliaError {
    fn from(err: anyhow::Error) -> Self {
        ReliaError::Other(err.to_string())
    }
}

impl From<String> for ReliaError {
    fn from(s: String) -> Self {
        ReliaError::Other(s)
    }
}

impl From<&str> for ReliaError {
    fn from(s: &str) -> Self {
        ReliaError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReliaError::Solver("voltage collapsed".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("voltage collapsed"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ReliaResult<()> {
            Err(ReliaError::Validation("bad zip coefficients".into()))
        }

        fn outer() -> ReliaResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
