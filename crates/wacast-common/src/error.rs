//! Error types for Wacast

use thiserror::Error;

/// Main error type for Wacast
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous sender configuration: {0}")]
    AmbiguousSender(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Wacast
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::AmbiguousSender(_) => 422,
            Error::Template(_) => 422,
            Error::Provider(_) => 502,
            Error::Conflict(_) => 409,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AmbiguousSender(_) => "AMBIGUOUS_SENDER",
            Error::Template(_) => "TEMPLATE_ERROR",
            Error::Provider(_) => "PROVIDER_ERROR",
            Error::Conflict(_) => "CONFLICT",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}
