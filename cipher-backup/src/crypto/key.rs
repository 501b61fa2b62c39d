//! Symmetric key material loaded at startup.

use super::cipher::KEY_LEN;
use crate::utils::errors::{BackupError, Result};
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

/// Secret key bytes, wiped from memory on drop.
///
/// Only key files are length-checked on load; otherwise the cipher rejects
/// keys of the wrong size.
#[derive(Clone)]
pub struct KeyMaterial(Zeroizing<Vec<u8>>);

impl KeyMaterial {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Decode a hex-encoded key (surrounding whitespace ignored)
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| BackupError::Config(format!("invalid hex key: {}", e)))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Read a hex-encoded key from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let value = Zeroizing::new(std::env::var(var).map_err(|_| {
            BackupError::Config(format!("environment variable {} not set", var))
        })?);
        Self::from_hex(&value)
    }

    /// Read a key file holding either the hex encoding of the key or the raw
    /// key bytes.
    ///
    /// Content that is entirely hex digits (surrounding whitespace ignored) is
    /// always decoded as hex and must decode to exactly `KEY_LEN` bytes. Any
    /// other content is taken as raw bytes and must be exactly `KEY_LEN` long.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = Zeroizing::new(std::fs::read(path).map_err(|e| {
            BackupError::Config(format!("cannot read key file {}: {}", path.display(), e))
        })?);

        let hex_text = std::str::from_utf8(&content)
            .ok()
            .map(str::trim)
            .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_hexdigit()));

        let key = match hex_text {
            Some(text) => Self::from_hex(text)?,
            None => Self::from_bytes(content.to_vec()),
        };

        if key.len() != KEY_LEN {
            return Err(BackupError::Config(format!(
                "key file {} holds a {}-byte key, expected {}",
                path.display(),
                key.len(),
                KEY_LEN
            )));
        }
        Ok(key)
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

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED; {}])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_hex() {
        let key = KeyMaterial::from_hex(&format!(" {} \n", "ab".repeat(32))).unwrap();
        assert_eq!(key.len(), 32);
        assert!(key.as_bytes().iter().all(|b| *b == 0xab));

        assert!(matches!(
            KeyMaterial::from_hex("not hex"),
            Err(BackupError::Config(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = KeyMaterial::from_bytes(vec![0x42; 32]);
        let shown = format!("{:?}", key);
        assert_eq!(shown, "KeyMaterial([REDACTED; 32])");
    }

    #[test]
    fn test_from_file_raw_and_hex() {
        let dir = TempDir::new().unwrap();

        let raw = dir.path().join("raw.key");
        std::fs::write(&raw, [5u8; 32]).unwrap();
        assert_eq!(KeyMaterial::from_file(&raw).unwrap().as_bytes(), &[5u8; 32]);

        let encoded = dir.path().join("hex.key");
        std::fs::write(&encoded, format!("{}\n", "01".repeat(32))).unwrap();
        assert_eq!(KeyMaterial::from_file(&encoded).unwrap().as_bytes(), &[1u8; 32]);

        let missing = dir.path().join("missing.key");
        assert!(matches!(
            KeyMaterial::from_file(&missing),
            Err(BackupError::Config(_))
        ));
    }

    #[test]
    fn test_from_file_prefers_hex() {
        let dir = TempDir::new().unwrap();

        // 32 hex characters: a 16-byte key, not 32 raw bytes.
        let short = dir.path().join("aes128.key");
        std::fs::write(&short, "00112233445566778899aabbccddeeff").unwrap();
        let err = KeyMaterial::from_file(&short).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
        assert!(err.to_string().contains("16-byte"));

        // 32 raw bytes that are not all hex digits stay raw.
        let raw = dir.path().join("raw.key");
        let mut bytes = [b'z'; 32];
        bytes[0] = 0xff;
        std::fs::write(&raw, bytes).unwrap();
        assert_eq!(KeyMaterial::from_file(&raw).unwrap().as_bytes(), &bytes);

        let wrong = dir.path().join("wrong.key");
        std::fs::write(&wrong, [7u8; 31]).unwrap();
        assert!(matches!(
            KeyMaterial::from_file(&wrong),
            Err(BackupError::Config(_))
        ));
    }

    #[test]
    fn test_from_env_missing_variable() {
        let err = KeyMaterial::from_env("CIPHER_BACKUP_TEST_UNSET_KEY_VAR").unwrap_err();
        assert!(err.to_string().contains("CIPHER_BACKUP_TEST_UNSET_KEY_VAR"));
    }
}
