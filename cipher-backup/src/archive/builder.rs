//! Builds one tar archive of encrypted members from a directory tree.

use crate::crypto::cipher;
use crate::fs::walker::{walk_files, FileRecord};
use crate::utils::errors::{BackupError, Result};
use crate::utils::format::format_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Permission bits recorded on every member
const MEMBER_MODE: u32 = 0o600;

/// How archive members are named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberNaming {
    /// File name only; directory components are dropped
    #[default]
    BaseName,

    /// Path relative to the source root, `/`-separated
    RelativePath,
}

impl MemberNaming {
    fn member_name(self, record: &FileRecord) -> String {
        match self {
            MemberNaming::BaseName => record.name.clone(),
            MemberNaming::RelativePath => record.relative_name(),
        }
    }
}

/// A finished archive on local disk
#[derive(Debug, Clone)]
pub struct Archive {
    /// Final location of the archive file
    pub path: PathBuf,

    /// Member names in the order they were written
    pub members: Vec<String>,

    /// Sum of plaintext sizes of all members
    pub plaintext_bytes: u64,

    /// Size of the archive file in bytes
    pub size: u64,
}

/// Archive builder: walks a source tree, encrypts every file and writes it
/// as an archive member.
///
/// Files the run itself produces (the partial archive, the output archive
/// and any path passed to [`ArchiveBuilder::skip_path`]) are never archived,
/// even when they live inside the source tree.
pub struct ArchiveBuilder<'a> {
    key: &'a [u8],
    naming: MemberNaming,
    skip: Vec<PathBuf>,
}

impl<'a> ArchiveBuilder<'a> {
    /// Creates a builder that encrypts members with `key`.
    pub fn new(key: &'a [u8]) -> Self {
        Self {
            key,
            naming: MemberNaming::default(),
            skip: Vec::new(),
        }
    }

    /// Sets the member naming policy.
    pub fn with_naming(mut self, naming: MemberNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Never archive `path` (e.g. the run log) if it lies under the source.
    pub fn skip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip.push(path.into());
        self
    }

    /// Builds the archive for `source_dir` at `output_path`.
    ///
    /// Members are streamed into a temporary file next to `output_path`,
    /// which is renamed into place once the tar stream is complete. If any
    /// step fails the temporary file is removed and nothing appears at
    /// `output_path`.
    pub fn build(&self, source_dir: &Path, output_path: &Path) -> Result<Archive> {
        let parent = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| {
            BackupError::ArchiveWrite(format!("cannot create {}: {}", parent.display(), e))
        })?;

        let temp = tempfile::Builder::new()
            .prefix(".cipher-backup-")
            .suffix(".partial")
            .tempfile_in(&parent)
            .map_err(|e| {
                BackupError::ArchiveWrite(format!(
                    "cannot create temporary archive in {}: {}",
                    parent.display(),
                    e
                ))
            })?;

        let own_files: HashSet<PathBuf> = self
            .skip
            .iter()
            .map(PathBuf::as_path)
            .chain([temp.path(), output_path])
            .filter_map(resolve)
            .collect();
        let source_root = resolve(source_dir);

        let mut tar = tar::Builder::new(BufWriter::new(temp.as_file()));
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        let mut plaintext_bytes = 0u64;

        walk_files(source_dir, |record| {
            if let Some(root) = &source_root {
                if own_files.contains(&root.join(&record.relative_path)) {
                    debug!("Skipping own file {}", record.path.display());
                    return Ok(());
                }
            }

            let name = self.naming.member_name(&record);
            if !seen.insert(name.clone()) {
                return Err(BackupError::ArchiveWrite(format!(
                    "duplicate member name {} (from {})",
                    name,
                    record.relative_path.display()
                )));
            }

            let plaintext = std::fs::read(&record.path).map_err(|e| {
                BackupError::Traversal(format!("cannot read {}: {}", record.path.display(), e))
            })?;
            let blob = cipher::encrypt(&plaintext, self.key)?;

            append_member(&mut tar, &name, blob.as_bytes())?;
            info!(
                "Added member {} ({} -> {})",
                name,
                format_bytes(plaintext.len() as u64),
                format_bytes(blob.len() as u64)
            );

            plaintext_bytes += plaintext.len() as u64;
            members.push(name);
            Ok(())
        })?;

        let mut writer = tar
            .into_inner()
            .map_err(|e| BackupError::ArchiveWrite(format!("cannot finish archive: {}", e)))?;
        writer
            .flush()
            .map_err(|e| BackupError::ArchiveWrite(format!("cannot flush archive: {}", e)))?;
        drop(writer);
        temp.as_file()
            .sync_all()
            .map_err(|e| BackupError::ArchiveWrite(format!("cannot sync archive: {}", e)))?;

        temp.persist(output_path).map_err(|e| {
            BackupError::ArchiveWrite(format!(
                "cannot move archive to {}: {}",
                output_path.display(),
                e.error
            ))
        })?;

        let size = std::fs::metadata(output_path)?.len();
        debug!(
            "Archive {} finalized: {} members, {}",
            output_path.display(),
            members.len(),
            format_bytes(size)
        );

        Ok(Archive {
            path: output_path.to_path_buf(),
            members,
            plaintext_bytes,
            size,
        })
    }
}

/// Absolute, symlink-free form of `path`. Paths that do not exist yet are
/// resolved through their parent directory.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Some(resolved);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|p| p.join(name))
}

/// Appends one member with fixed ownership, mode and mtime so that headers
/// depend only on the member name and size.
fn append_member<W: Write>(tar: &mut tar::Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(MEMBER_MODE);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);

    tar.append_data(&mut header, name, data)
        .map_err(|e| BackupError::ArchiveWrite(format!("cannot write member {}: {}", name, e)))
}
