//! Shared HTTP plumbing for the reqwest-backed transports

use crate::domain::{TransportError, TransportErrorKind};
use crate::transport::traits::{CONNECT_TIMEOUT, READ_TIMEOUT};
use reqwest::StatusCode;

/// Builds a client with the transport-wide connect/read deadlines
pub(crate) fn http_client() -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()
        .map_err(|e| TransportError::unreachable(format!("failed to build HTTP client: {e}")))
}

/// Classifies a request-level failure (no response received)
pub(crate) fn classify_request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::unreachable(err.to_string())
    } else {
        TransportError::unreachable(format!("request failed: {err}"))
    }
}

/// Classifies a non-success response status
///
/// Server errors and throttling are transient; auth failures and other
/// client errors are terminal.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let message = format!("{status}: {}", truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::auth_failure(message),
        StatusCode::REQUEST_TIMEOUT => TransportError::timeout(message),
        StatusCode::TOO_MANY_REQUESTS => TransportError {
            kind: TransportErrorKind::Rejected,
            retryable: true,
            message,
        },
        s if s.is_server_error() => TransportError {
            kind: TransportErrorKind::Unreachable,
            retryable: true,
            message,
        },
        _ => TransportError::rejected(message),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
