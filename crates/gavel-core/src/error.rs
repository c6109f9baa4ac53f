//! Unified error types for the Gavel core.
//!
//! Framework-level errors (registry, pagination) are defined in
//! `gavel-framework`; configuration errors in `gavel-runtime`.

use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Descriptions the platform returns for failures that are safe to ignore
/// during callback cleanup.
const BENIGN_DESCRIPTIONS: &[&str] = &[
    "message is not modified",
    "query is too old",
    "query_id_invalid",
    "query id is invalid",
    "message can't be deleted",
    "message to delete not found",
];

/// Errors returned by [`Transport`](crate::Transport) calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The transport has been closed.
    #[error("transport is not connected")]
    NotConnected,

    /// The request did not complete in time.
    #[error("API call timed out")]
    Timeout,

    /// The platform asked us to slow down.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: u64,
    },

    /// The platform rejected the request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The bot lacks access to the chat or was removed from it.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The target message is already gone, or the bot may not touch it.
    #[error("message not found or forbidden: {0}")]
    NotFoundOrForbidden(String),

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a bad-request error.
    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::BadRequest(description.into())
    }

    /// Creates a not-found-or-forbidden error.
    pub fn not_found(description: impl Into<String>) -> Self {
        Self::NotFoundOrForbidden(description.into())
    }

    /// Creates a network error.
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network(reason.into())
    }

    /// Returns `true` for failures that mean "already done" rather than
    /// "something went wrong": already answered, already deleted, unchanged.
    pub fn is_benign(&self) -> bool {
        match self {
            Self::NotFoundOrForbidden(_) => true,
            Self::BadRequest(description) => {
                let description = description.to_lowercase();
                BENIGN_DESCRIPTIONS
                    .iter()
                    .any(|benign| description.contains(benign))
            }
            _ => false,
        }
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors returned by [`Store`](crate::Store) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Namespace or key is not usable by this backend.
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
