//! Common error types for traitscore

use thiserror::Error;

/// Common result type for traitscore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the engine and its tooling
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of a stored value failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error is SQLite reporting lock contention
    /// (`SQLITE_BUSY` / `SQLITE_LOCKED`).
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let text = db_err.to_string();
                text.contains("database is locked")
                    || text.contains("database table is locked")
                    || text.contains("database is busy")
            }
            _ => false,
        }
    }
}
