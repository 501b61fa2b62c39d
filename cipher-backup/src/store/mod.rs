//! Object-store destinations for finished archives.
//!
//! The pipeline only needs a single capability from a store: put one named
//! object. Each backend below provides it over a different transport.

pub mod http;
pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use http::HttpStore;
pub use local::LocalStore;
pub use s3::S3Store;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid object key {0:?}")]
    InvalidKey(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("store rejected object (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A remote (or local) destination that accepts whole objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `name`, replacing any existing object.
    async fn put_object(&self, name: &str, data: Bytes) -> Result<(), StoreError>;

    /// Human-readable destination, used in logs and run outcomes.
    fn describe(&self) -> String;
}

/// Store selection, tagged by `kind` in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// AWS S3 or an S3-compatible service
    S3 {
        bucket: String,

        #[serde(default = "default_region")]
        region: String,

        /// Custom endpoint (MinIO, Wasabi, ...); enables path-style addressing
        #[serde(default)]
        endpoint: Option<String>,

        /// Key prefix prepended to every object
        #[serde(default)]
        prefix: String,
    },

    /// Backup server upload endpoint
    Http {
        url: String,

        /// Bearer token sent with every request
        #[serde(default)]
        token: Option<String>,
    },

    /// Directory on a local or mounted file system
    Local { dir: PathBuf },
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Open the store described by `config`.
///
/// `job_name` identifies uploads to stores that track jobs (the HTTP backend).
pub async fn connect(config: &StoreConfig, job_name: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store: Arc<dyn ObjectStore> = match config {
        StoreConfig::S3 {
            bucket,
            region,
            endpoint,
            prefix,
        } => Arc::new(S3Store::new(bucket, region, endpoint.as_deref(), prefix).await),
        StoreConfig::Http { url, token } => {
            Arc::new(HttpStore::new(url, job_name, token.clone())?)
        }
        StoreConfig::Local { dir } => Arc::new(LocalStore::new(dir)),
    };

    tracing::debug!("Connected to store {}", store.describe());
    Ok(store)
}

/// Rejects keys that are empty or could escape a prefix or directory.
pub(crate) fn validate_key(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidKey(name.to_string()));
    }
    Ok(())
}
