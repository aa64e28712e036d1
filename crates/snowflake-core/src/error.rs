//! Error types for snowflake-core.

use thiserror::Error;

use crate::config::ConfigValidationError;
use crate::validation::ValidationErrors;

/// Result type alias using snowflake-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for engine operations
#[derive(Error, Debug)]
pub enum Error {
    // Caller-correctable preconditions
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("stage number must be between 1 and 10, got {0}")]
    InvalidStageNumber(i64),

    #[error("No project loaded. Use init or load first.")]
    NoActiveProject,

    #[error("Project already exists: {0}")]
    ProjectExists(String),

    #[error("stage {stage} works on a single scene; a scene number is required")]
    SceneRequired { stage: u8 },

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned")]
    LockPoisoned,

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // External collaborators
    #[error("style retriever error: {0}")]
    StyleRetriever(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Create a style retriever error
    pub fn style_retriever(message: impl Into<String>) -> Self {
        Self::StyleRetriever(message.into())
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed(_))
    }

    /// Field-level detail of a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }
}
