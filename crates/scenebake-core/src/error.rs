//! Unified error handling for scenebake
//!
//! This module provides the error type raised when the input scene graph
//! does not satisfy the shape the exporter relies on.

use thiserror::Error;

/// Unified error type for scene-model operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Input Shape Errors ====================

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Two arrays that must be parallel have different lengths
    #[error("Length mismatch in {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    /// An index points outside the array it refers to
    #[error("Index out of range in {what}: {index} >= {len}")]
    IndexOutOfRange {
        what: String,
        index: usize,
        len: usize,
    },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Error::LengthMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    /// The innermost error, with every context layer removed
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::length_mismatch("normals", 3, 2);
        let contextualized = err.with_context("mesh 'body'");

        let message = contextualized.to_string();
        assert!(message.contains("mesh 'body'"));
        assert!(message.contains("expected 3, found 2"));
    }

    #[test]
    fn test_root_cause() {
        let err = Error::invalid_data("x").with_context("inner").with_context("outer");
        assert!(matches!(err.root_cause(), Error::InvalidData { .. }));
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::invalid_data("no positions"));
        let with_context = result.with_context(|| "validating node '|root'".to_string());

        assert!(with_context.unwrap_err().to_string().starts_with("validating node '|root'"));
    }
}
