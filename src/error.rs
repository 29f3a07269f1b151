//! Error types for the sync and authorization layer
//!
//! Backend and signer failures are caught at the boundary of each flow and
//! turned into notices; these types carry the cause up to that boundary.

use thiserror::Error;

/// Failure talking to the grid bot service.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("circuit breaker is open, rejecting request")]
    CircuitOpen,

    /// The service answered but reported `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Failure obtaining a wallet signature.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signature request rejected by user")]
    Rejected,

    #[error("signing failed: {0}")]
    Failed(String),

    #[error("unsupported chain for address {0}")]
    UnsupportedChain(String),
}

/// Errors surfaced by the fetch coordinator and the stop flow.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no authenticated account")]
    NotAuthenticated,

    #[error("failed to fetch strategies: {0}")]
    Fetch(#[source] BackendError),

    #[error("failed to obtain challenge: {0}")]
    Challenge(#[source] BackendError),

    #[error("failed to sign challenge: {0}")]
    Signing(#[from] SignerError),

    #[error("stop request failed: {0}")]
    Submit(#[source] BackendError),

    #[error("strategy {0} is not in the current view")]
    UnknownStrategy(String),
}

pub type BackendResult<T> = Result<T, BackendError>;
