// BookVault Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    #[error("Incompatible backup: {0}")]
    IncompatibleBackup(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for VaultError {
    /// Constraint violations become conflicts the caller can recognize;
    /// everything else stays a plain database error.
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                VaultError::StorageConflict(err.to_string())
            }
            _ => VaultError::Database(err),
        }
    }
}

impl From<anyhow::Error> for VaultError {
    fn from(err: anyhow::Error) -> Self {
        VaultError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
