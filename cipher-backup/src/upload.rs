//! Single-shot archive upload.

use crate::store::ObjectStore;
use crate::utils::errors::{BackupError, Result};
use crate::utils::format::format_bytes;
use bytes::Bytes;
use std::path::Path;
use tracing::info;

/// Sends a finished archive to a store in one request.
///
/// There is no retry, chunking or resume: one attempt either succeeds or the
/// error is returned to the caller.
pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Upload the archive at `archive_path` under `destination_key`.
    ///
    /// Returns the number of bytes sent.
    pub async fn upload(&self, archive_path: &Path, destination_key: &str) -> Result<u64> {
        let data = tokio::fs::read(archive_path).await.map_err(|e| {
            BackupError::Upload(format!(
                "cannot read archive {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let size = data.len() as u64;

        self.store
            .put_object(destination_key, Bytes::from(data))
            .await?;

        info!(
            "Uploaded {} ({}) to {}",
            destination_key,
            format_bytes(size),
            self.store.describe()
        );
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeStore {
        puts: Mutex<Vec<(String, Bytes)>>,
        fail: bool,
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn put_object(&self, name: &str, data: Bytes) -> std::result::Result<(), StoreError> {
            self.puts.lock().unwrap().push((name.to_string(), data));
            if self.fail {
                return Err(StoreError::Request("connection reset".to_string()));
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "fake://store".to_string()
        }
    }

    #[tokio::test]
    async fn test_upload_sends_archive_once() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("backup.tar");
        std::fs::write(&archive, b"tar-bytes").unwrap();

        let store = FakeStore::default();
        let sent = Uploader::new(&store).upload(&archive, "backup.tar").await.unwrap();

        assert_eq!(sent, 9);
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "backup.tar");
        assert_eq!(puts[0].1.as_ref(), b"tar-bytes");
    }

    #[tokio::test]
    async fn test_store_failure_is_upload_error_without_retry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("backup.tar");
        std::fs::write(&archive, b"tar-bytes").unwrap();

        let store = FakeStore {
            fail: true,
            ..Default::default()
        };
        let err = Uploader::new(&store).upload(&archive, "backup.tar").await.unwrap_err();

        assert!(matches!(err, BackupError::Upload(_)));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(store.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_archive_is_upload_error() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore::default();

        let err = Uploader::new(&store)
            .upload(&dir.path().join("missing.tar"), "backup.tar")
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::Upload(_)));
        assert!(store.puts.lock().unwrap().is_empty());
    }
}
