//! Error type definitions for the job processor

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Job store / execution log store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Content generator errors
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by job store and execution log store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Stored JSON documents that no longer deserialize
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Identifier columns that are not valid UUIDs
    #[error("Invalid identifier '{value}': {source}")]
    InvalidId {
        value: String,
        #[source]
        source: uuid::Error,
    },

    /// Schedule configuration the store cannot interpret
    #[error("Invalid schedule for job {job_id}: {message}")]
    InvalidSchedule { job_id: String, message: String },

    /// Terminal log entries never change again
    #[error("Execution log entry {entry_id} is already completed")]
    EntryCompleted { entry_id: String },

    /// Stored column values that do not map back to a domain value
    #[error("Invalid {resource} record: {message}")]
    InvalidRecord { resource: String, message: String },

    /// Store refused or could not serve the request
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors raised while calling the content generator
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Connection, timeout or body decoding failure
    #[error("Generator request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Generator returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body that does not match the generation contract
    #[error("Invalid generator response: {message}")]
    InvalidResponse { message: String },

    /// Client could not be constructed
    #[error("Generator client configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: ToString>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create an already-completed error for a log entry
    pub fn entry_completed<I: ToString>(entry_id: I) -> Self {
        Self::EntryCompleted {
            entry_id: entry_id.to_string(),
        }
    }

    /// Create an invalid-record error
    pub fn invalid_record<R: Into<String>, S: Into<String>>(resource: R, message: S) -> Self {
        Self::InvalidRecord {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Parse a stored identifier column
    pub fn parse_id(value: &str) -> Result<uuid::Uuid, Self> {
        uuid::Uuid::parse_str(value).map_err(|source| Self::InvalidId {
            value: value.to_string(),
            source,
        })
    }
}

impl GeneratorError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the request never produced a response in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}
