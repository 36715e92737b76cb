//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only caller misuse ends up here. Data-quality anomalies in historical
/// records (oversold products, rows without identity, ...) are counted by the
/// engine and never raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. an inverted date range).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request is missing a scope that the operation cannot work without.
    #[error("missing scope: {0}")]
    MissingScope(&'static str),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_scope(scope: &'static str) -> Self {
        Self::MissingScope(scope)
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
