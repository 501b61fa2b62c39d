//! Encrypted archive assembly.
//!
//! The archive is a plain tar stream. Each member holds one encrypted file
//! (`iv || ciphertext`) and carries no metadata beyond its name and size.

pub mod builder;

pub use builder::{Archive, ArchiveBuilder, MemberNaming};
