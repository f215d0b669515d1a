use std::io;
use thiserror::Error;

/// Custom error types for the clock sync handler
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Downlink error: {0}")]
    Downlink(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Object does not exist: {0}")]
    NotFound(String),

    #[error("Timing error: {0}")]
    Timing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// Creates a new contract violation error
    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Error::ContractViolation(msg.into())
    }

    /// Creates a new encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        Error::Encode(msg.into())
    }

    /// Creates a new downlink error
    pub fn downlink(msg: impl Into<String>) -> Self {
        Error::Downlink(msg.into())
    }

    /// Creates a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new timing error
    pub fn timing(msg: impl Into<String>) -> Self {
        Error::Timing(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Returns true for errors that break the protocol exchange with the device.
    ///
    /// Ledger errors (storage, not found) are bookkeeping failures and are
    /// never surfaced as a failed uplink.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::ContractViolation(_) | Error::Encode(_) | Error::Downlink(_)
        )
    }
}
