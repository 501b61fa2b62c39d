//! Cipher Backup Library
//!
//! Encrypts every file under a directory with AES-256-CBC, packs the
//! encrypted blobs into one tar archive and uploads it to an object store.

pub mod archive;
pub mod config;
pub mod crypto;
pub mod executor;
pub mod fs;
pub mod store;
pub mod upload;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupJob, Pipeline, RunReport};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
