//! Feed error types

use thiserror::Error;

/// Errors raised by the relay feed manager and its collaborators
#[derive(Error, Debug)]
pub enum FeedError {
    /// Wrong runtime context (no storage backend or no async runtime)
    #[error("Environment error: {0}")]
    Environment(String),

    /// A method that needs `initialize()` was called first
    #[error("Relay feed manager not initialized")]
    NotInitialized,

    /// Relay address rejected by validation
    #[error("Invalid relay address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Relay address already configured
    #[error("Relay address already configured: {0}")]
    DuplicateAddress(String),

    /// Per-relay subscribe or close failure
    #[error("Relay connection error on {relay}: {reason}")]
    RelayConnection { relay: String, reason: String },

    /// Event failed boundary validation
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeedError {
    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn relay_connection(relay: impl ToString, reason: impl ToString) -> Self {
        Self::RelayConnection {
            relay: relay.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Feed result type
pub type Result<T> = std::result::Result<T, FeedError>;
