//! Local directory destination (a mounted share, a second disk, ...).

use super::{validate_key, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_object(&self, name: &str, data: Bytes) -> Result<(), StoreError> {
        validate_key(name)?;
        let dest = self.root.join(name);

        // Temp file in the destination directory, renamed into place.
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let parent = dest.parent().unwrap_or(Path::new("."));
            std::fs::create_dir_all(parent)?;

            let mut temp = tempfile::NamedTempFile::new_in(parent)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Request(format!("write task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
