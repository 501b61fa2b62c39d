//! File system access for backup runs.

pub mod walker;

pub use walker::{walk_files, FileRecord};
