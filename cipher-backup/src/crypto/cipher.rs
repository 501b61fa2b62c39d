//! Per-file encryption: AES-256 in CBC mode with PKCS#7 padding.
//!
//! Every call draws a fresh IV from the thread-local CSPRNG and returns
//! `iv || ciphertext`. There is no authentication tag, so tampering with a
//! blob is only noticed (if at all) when a reader fails to unpad it.

use crate::utils::errors::{BackupError, Result};
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

/// Required key length in bytes (256 bits)
pub const KEY_LEN: usize = 32;

/// Length of the IV that prefixes every blob
pub const IV_LEN: usize = 16;

/// AES block size
pub const BLOCK_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Encrypted file contents: `iv || ciphertext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    pub fn iv(&self) -> &[u8] {
        &self.0[..IV_LEN]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.0[IV_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Size of the blob produced for `plaintext_len` bytes of input.
///
/// PKCS#7 always adds padding, so block-aligned input grows by a full block.
pub fn encrypted_len(plaintext_len: usize) -> usize {
    IV_LEN + (plaintext_len / BLOCK_LEN + 1) * BLOCK_LEN
}

/// Encrypt `plaintext` under `key`.
///
/// Fails with [`BackupError::Encryption`] unless `key` is exactly
/// [`KEY_LEN`] bytes long.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<EncryptedBlob> {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key, &iv).map_err(|_| {
        BackupError::Encryption(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        ))
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);

    Ok(EncryptedBlob(blob))
}
