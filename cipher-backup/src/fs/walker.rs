//! Directory traversal for archive building.
//!
//! Visits every regular file under a root in a stable order (sorted by file
//! name within each directory). Any entry that cannot be read aborts the
//! walk: a backup either sees the whole tree or fails.

use crate::utils::errors::{BackupError, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A regular file discovered during walking
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// Final path component
    pub name: String,

    /// File size in bytes
    pub size: u64,
}

impl FileRecord {
    fn from_entry(entry: &DirEntry, root: &Path) -> Result<Self> {
        let metadata = entry.metadata().map_err(|e| {
            BackupError::Traversal(format!("cannot stat {}: {}", entry.path().display(), e))
        })?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Self {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            relative_path,
            size: metadata.len(),
        })
    }

    /// Relative path with `/` separators, independent of the host platform
    pub fn relative_name(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Walk a directory tree, calling `callback` for each regular file in order.
///
/// Symbolic links are not followed and, like sockets or FIFOs, are not
/// reported. The first traversal error or callback error stops the walk and
/// is returned.
///
/// # Example
/// ```no_run
/// use cipher_backup::fs::walker::walk_files;
/// use std::path::Path;
///
/// let mut count = 0;
/// walk_files(Path::new("/data"), |_| {
///     count += 1;
///     Ok(())
/// }).unwrap();
/// println!("Found {} files", count);
/// ```
pub fn walk_files<F>(root: &Path, mut callback: F) -> Result<()>
where
    F: FnMut(FileRecord) -> Result<()>,
{
    let metadata = std::fs::metadata(root).map_err(|e| {
        BackupError::Traversal(format!("cannot read source {}: {}", root.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(BackupError::Traversal(format!(
            "source {} is not a directory",
            root.display()
        )));
    }

    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string());
            BackupError::Traversal(format!("cannot read {}: {}", path, e))
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            tracing::debug!("Skipping non-regular entry: {}", entry.path().display());
            continue;
        }

        callback(FileRecord::from_entry(&entry, root)?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn collect(root: &Path) -> Result<Vec<FileRecord>> {
        let mut files = Vec::new();
        walk_files(root, |record| {
            files.push(record);
            Ok(())
        })?;
        Ok(files)
    }

    #[test]
    fn test_walk_empty_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let files = collect(temp_dir.path())?;
        assert!(files.is_empty());
        Ok(())
    }

    #[test]
    fn test_walk_with_subdirectories_is_sorted() -> Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("sub"))?;
        fs::write(temp_dir.path().join("b.txt"), b"bb")?;
        fs::write(temp_dir.path().join("a.txt"), b"a")?;
        fs::write(temp_dir.path().join("sub/c.txt"), b"ccc")?;

        let files = collect(temp_dir.path())?;
        let names: Vec<_> = files.iter().map(|f| f.relative_name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub/c.txt"]);

        let nested = &files[2];
        assert_eq!(nested.name, "c.txt");
        assert_eq!(nested.size, 3);
        assert!(nested.path.starts_with(temp_dir.path()));

        Ok(())
    }

    #[test]
    fn test_hidden_entries_are_walked() -> Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join(".git"))?;
        fs::write(temp_dir.path().join(".git/HEAD"), b"ref")?;
        fs::write(temp_dir.path().join(".gitignore"), b"target")?;
        fs::write(temp_dir.path().join("file.txt"), b"keep")?;

        let files = collect(temp_dir.path())?;
        let names: Vec<_> = files.iter().map(|f| f.relative_name()).collect();
        assert_eq!(names, vec![".git/HEAD", ".gitignore", "file.txt"]);

        Ok(())
    }

    #[test]
    fn test_missing_root_is_traversal_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = collect(&missing).unwrap_err();
        assert!(matches!(err, BackupError::Traversal(_)));
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let err = collect(&file).unwrap_err();
        assert!(matches!(err, BackupError::Traversal(_)));
    }

    #[test]
    fn test_callback_error_stops_walk() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("a.txt"), b"a")?;
        fs::write(temp_dir.path().join("b.txt"), b"b")?;

        let mut seen = 0;
        let result = walk_files(temp_dir.path(), |_| {
            seen += 1;
            Err(BackupError::ArchiveWrite("stop".to_string()))
        });

        assert!(matches!(result, Err(BackupError::ArchiveWrite(_))));
        assert_eq!(seen, 1);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_are_not_reported() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("real.txt"), b"data")?;
        std::os::unix::fs::symlink(
            temp_dir.path().join("real.txt"),
            temp_dir.path().join("link.txt"),
        )?;

        let files = collect(temp_dir.path())?;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "real.txt");
        Ok(())
    }
}
