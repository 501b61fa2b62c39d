//! Encryption of file contents before they enter the archive.

pub mod cipher;
pub mod key;

pub use cipher::{encrypt, EncryptedBlob, IV_LEN, KEY_LEN};
pub use key::KeyMaterial;
