//! Application Error Types

use thiserror::Error;

use crate::extensions::{DefinitionError, LoaderError};

/// Application Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Application errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// A definition failed validation; nothing was loaded
    #[error("invalid extension definition: {0}")]
    Definition(#[from] DefinitionError),

    /// Loader error
    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    /// First load pass reported an error (fail-fast construction)
    #[error("startup failed: {message}")]
    Startup { message: String },
}

impl AppError {
    /// Create a startup error
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Check if this error is a definition validation error
    pub fn is_definition(&self) -> bool {
        matches!(self, Self::Definition(_))
    }

    /// Check if this error came from a failed first load pass
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Startup { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AppError::startup("Missing provider for \"math\"");
        assert!(err.is_startup());
        assert!(err.to_string().contains("math"));

        let err = AppError::from(DefinitionError::MissingClass("{}".into()));
        assert!(err.is_definition());
        assert!(!err.is_startup());
        assert!(err.to_string().contains("class"));
    }
}
