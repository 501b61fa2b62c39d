//! Error types for the backup pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Traversal error: {0}")]
    Traversal(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Archive write error: {0}")]
    ArchiveWrite(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::store::StoreError> for BackupError {
    fn from(err: crate::store::StoreError) -> Self {
        BackupError::Upload(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
