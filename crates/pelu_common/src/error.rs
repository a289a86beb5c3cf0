use std::fmt;
use thiserror::Error;

/// The base error type shared across every crate in the workspace.
///
/// Crate-specific error enums (`DbError`, `GcalError`, ...) convert into this
/// at the boundary where they cross into HTTP handlers or cross-crate calls.
#[derive(Error, Debug)]
pub enum PeluError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("failed to parse data: {0}")]
    ParseError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("external service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// The session attempted to book a slot that is no longer free — the
    /// capacity check or a unique-constraint race lost.
    #[error("conflict: {0}")]
    ConflictError(String),

    #[error("not found: {0}")]
    NotFoundError(String),

    #[error("timeout: {0}")]
    TimeoutError(String),

    #[error("rate limited: {0}")]
    RateLimitError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("other error: {0}")]
    OtherError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for PeluError {
    fn status_code(&self) -> u16 {
        match self {
            PeluError::HttpError(_) => 500,
            PeluError::ParseError(_) => 400,
            PeluError::ConfigError(_) => 500,
            PeluError::AuthError(_) => 401,
            PeluError::ValidationError(_) => 400,
            PeluError::DatabaseError(_) => 500,
            PeluError::ExternalServiceError { .. } => 502,
            PeluError::ConflictError(_) => 409,
            PeluError::NotFoundError(_) => 404,
            PeluError::TimeoutError(_) => 504,
            PeluError::RateLimitError(_) => 429,
            PeluError::InternalError(_) => 500,
            PeluError::OtherError(_) => 500,
        }
    }
}

/// Adds context to a foreign error while folding it into [`PeluError`].
pub trait Context<T, E> {
    fn context<C>(self, context: C) -> Result<T, PeluError>
    where
        C: fmt::Display + Send + Sync + 'static;

    fn with_context<C, F>(self, f: F) -> Result<T, PeluError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E: std::error::Error + Send + Sync + 'static> Context<T, E> for Result<T, E> {
    fn context<C>(self, context: C) -> Result<T, PeluError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|error| PeluError::InternalError(format!("{}: {}", context, error)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, PeluError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| PeluError::InternalError(format!("{}: {}", f(), error)))
    }
}

impl From<reqwest::Error> for PeluError {
    fn from(err: reqwest::Error) -> Self {
        PeluError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for PeluError {
    fn from(err: serde_json::Error) -> Self {
        PeluError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for PeluError {
    fn from(err: std::io::Error) -> Self {
        PeluError::InternalError(err.to_string())
    }
}

pub fn config_error<T: fmt::Display>(message: T) -> PeluError {
    PeluError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> PeluError {
    PeluError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> PeluError {
    PeluError::NotFoundError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> PeluError {
    PeluError::ConflictError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> PeluError {
    PeluError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> PeluError {
    PeluError::InternalError(message.to_string())
}
