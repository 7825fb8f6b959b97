//! Error types for the cadence scheduling engine.

use thiserror::Error;

/// Main error type for cadence operations.
#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Reserved for a future policy that rejects double-booking outright
    /// instead of merely reporting it through availability.
    #[error("Scheduling conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CadenceError {
    /// Not-found error for an entry.
    pub fn entry_not_found(id: &str) -> Self {
        Self::NotFound(format!("calendar entry {id}"))
    }

    /// Not-found error for a calendar.
    pub fn calendar_not_found(id: &str) -> Self {
        Self::NotFound(format!("calendar {id}"))
    }

    /// Not-found error for a participant row.
    pub fn participant_not_found(entry_id: &str, user_id: &str) -> Self {
        Self::NotFound(format!("participant {user_id} on entry {entry_id}"))
    }
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Storage-related errors surfaced by `CalendarStore` implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cadence operations.
pub type Result<T> = std::result::Result<T, CadenceError>;
