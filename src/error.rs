//! Error types for the ShopLens engine
//!
//! This module provides the error hierarchy for the behavioral scoring
//! subsystem:
//! - `thiserror` for ergonomic error definitions
//! - Domain-specific variants for actionable error handling
//! - Proper error context and source chaining
//!
//! Caller-misuse errors (`Validation`, `NotFound`) are surfaced to the
//! immediate caller. Transient store failures and malformed stored payloads
//! are absorbed inside the scoring pipeline per component policy.

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for ShopLens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ShopLens engine
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Caller errors
    // ========================================================================
    #[error("Validation error: {message}")]
    Validation { message: Cow<'static, str> },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    // ========================================================================
    // Store errors
    // ========================================================================
    #[error("Store error: {message}")]
    Store {
        message: Cow<'static, str>,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Store connection pool exhausted")]
    PoolExhausted,

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: Cow<'static, str> },

    #[error("Migration error: {0}")]
    Migration(String),

    // ========================================================================
    // Payload errors
    // ========================================================================
    #[error("Malformed stored payload for behavior type {behavior_type}: {message}")]
    MalformedPayload {
        behavior_type: &'static str,
        message: Cow<'static, str>,
        #[source]
        source: Option<serde_json::Error>,
    },

    // ========================================================================
    // Configuration errors
    // ========================================================================
    #[error("Configuration error: {message}")]
    Config { message: Cow<'static, str> },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        key: &'static str,
        message: Cow<'static, str>,
    },
}

impl Error {
    // ========================================================================
    // Constructors for common error patterns
    // ========================================================================

    /// Create a validation error
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a malformed payload error
    pub fn malformed_payload(
        behavior_type: &'static str,
        message: impl Into<Cow<'static, str>>,
        source: Option<serde_json::Error>,
    ) -> Self {
        Self::MalformedPayload {
            behavior_type,
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    // ========================================================================
    // Error classification
    // ========================================================================

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store { .. } | Error::PoolExhausted)
    }

    /// Returns true if this error indicates caller misuse and must be
    /// surfaced as a rejected operation rather than absorbed.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::NotFound { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound {
                entity_type: "record",
                id: "unknown".to_string(),
            },
            sqlx::Error::PoolTimedOut => Error::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    return Error::ConstraintViolation {
                        message: format!("Constraint '{}' violated", constraint).into(),
                    };
                }
                Error::Store {
                    message: db_err.message().to_string().into(),
                    source: Some(err),
                }
            }
            _ => Error::Store {
                message: err.to_string().into(),
                source: Some(err),
            },
        }
    }
}
