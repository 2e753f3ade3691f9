//! Error types for the metrics layer.
//!
//! This module defines a hierarchical error system:
//! - [`AppError`]: Top-level errors of the binary's setup and input plumbing
//! - [`NormalizeError`]: Payload normalization errors
//! - [`StoreError`]: Store update errors
//! - [`ConfigError`]: Configuration errors
//!
//! Store operations never return these to their callers. A failed update is
//! rendered with `Display` and recorded in
//! [`MetricsState::error`](crate::store::MetricsState::error).

use thiserror::Error;

/// Top-level application error.
///
/// Returned by the binary's setup and input plumbing. Normalization and store
/// failures never reach this level; the store records them instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input could not be read.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// The path (or `stdin`) being read.
        path: String,
        /// Description of the failure.
        message: String,
    },
}

/// Normalization errors.
///
/// The default normalizer never produces these; they come from stricter
/// extra-field policies or custom normalizers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// A field outside the configured allow-list was present.
    #[error("Unexpected field: {field}")]
    UnexpectedField {
        /// The raw (snake_case) field name.
        field: String,
    },

    /// The payload has a shape the normalizer refuses to handle.
    #[error("Invalid payload shape: {message}")]
    InvalidShape {
        /// Description of what's wrong with the shape.
        message: String,
    },
}

/// Store update errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The raw body was not valid JSON.
    #[error("Failed to decode metrics payload: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String,
    },

    /// The payload could not be normalized.
    #[error("Failed to normalize metrics from {source_name}: {error}")]
    Normalize {
        /// Source label of the offending payload.
        source_name: String,
        /// Underlying normalization error.
        error: NormalizeError,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// Configuration errors.
///
/// These errors represent failures in configuration loading and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}
