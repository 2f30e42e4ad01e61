//! Domain error types
//!
//! This module defines the error hierarchy for Courier. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Courier error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration-related errors (settings files, receiver authoring)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Schema or receiver validation failures
    #[error("Validation error: {0}")]
    Validation(String),

    /// Expression compilation errors
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Filter predicate errors
    #[error("Filter error: {0}")]
    Filter(#[from] FilterPredicateError),

    /// Transport delivery errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Scheduling invariant violations (fatal for the affected receiver)
    #[error("Scheduling invariant violation: {0}")]
    Scheduling(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Expression compilation errors
///
/// Raised when a condition, value, or resource expression fails to parse.
/// During schema validation these are collected into the schema's error
/// list rather than propagated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error at position {position}: {message}")]
pub struct ExpressionError {
    /// Byte offset into the expression text where parsing failed
    pub position: usize,

    /// What went wrong
    pub message: String,
}

impl ExpressionError {
    /// Creates a new expression error at the given position
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Filter predicate errors
///
/// A malformed predicate spec or kind-inappropriate arguments. Treated as
/// a rejection with a diagnostic reason during evaluation, never a crash.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterPredicateError {
    /// The predicate name is not one of the supported kinds
    #[error("Unknown filter predicate: {0}")]
    UnknownPredicate(String),

    /// The spec string is not valid function-call syntax
    #[error("Malformed filter spec '{spec}': {message}")]
    MalformedSpec { spec: String, message: String },

    /// The predicate received the wrong number or shape of arguments
    #[error("Predicate {predicate} has invalid arguments: {message}")]
    InvalidArguments { predicate: String, message: String },
}

/// Classification of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect or read deadline exceeded
    Timeout,
    /// The remote endpoint rejected our credentials
    AuthFailure,
    /// The remote endpoint could not be reached
    Unreachable,
    /// The remote endpoint refused the payload
    Rejected,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::AuthFailure => "authentication failure",
            TransportErrorKind::Unreachable => "unreachable",
            TransportErrorKind::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Transport delivery errors
///
/// The only error class raised mid-pipeline; caught at the scheduler
/// boundary and converted into a pending-retry state. Retryable kinds are
/// retried up to the configured bounded count with the same payload.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Failure classification
    pub kind: TransportErrorKind,

    /// Whether a retry with the same payload can succeed
    pub retryable: bool,

    /// Human-readable detail
    pub message: String,
}

impl TransportError {
    /// A connect/read deadline was exceeded (retryable)
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            retryable: true,
            message: message.into(),
        }
    }

    /// Credentials were refused (not retryable)
    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::AuthFailure,
            retryable: false,
            message: message.into(),
        }
    }

    /// The endpoint could not be reached (retryable)
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Unreachable,
            retryable: true,
            message: message.into(),
        }
    }

    /// The endpoint refused the payload (not retryable)
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Rejected,
            retryable: false,
            message: message.into(),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CourierError {
    fn from(err: std::io::Error) -> Self {
        CourierError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CourierError {
    fn from(err: toml::de::Error) -> Self {
        CourierError::Configuration(format!("TOML parse error: {err}"))
    }
}
