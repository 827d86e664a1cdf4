//! Crate-wide error types.
//!
//! One precise `thiserror` enum for the REST transport boundary. `anyhow`
//! is reserved for `main.rs`.

use thiserror::Error;

/// Errors from the REST snapshot fetch.
///
/// A `FetchError` never reaches the synchronizer's state machine directly.
/// [`crate::orderbook::snapshot::SnapshotSource`] implementations catch it and
/// translate it into a `Snapshot { valid: false, .. }`, which is what
/// [`crate::orderbook::sync::Synchronizer`] actually reasons about.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("failed to connect to exchange")]
    Connect,

    #[error("rate limited by exchange, retry later")]
    RateLimited,

    #[error("exchange returned an error: code={code} msg={msg}")]
    Api { code: i64, msg: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<rust_decimal::Error> for FetchError {
    fn from(err: rust_decimal::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

impl FetchError {
    /// Classifies a transport-level [`reqwest::Error`]: distinguishes
    /// timeouts, connect failures, and rate limiting, since the
    /// synchronizer's retry/backoff decision doesn't care about the rest.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                FetchError::RateLimited
            } else {
                FetchError::Http(err)
            }
        } else {
            FetchError::Http(err)
        }
    }
}
