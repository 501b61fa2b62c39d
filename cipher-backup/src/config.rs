//! Configuration management for backup runs.
//!
//! Loads configuration from a TOML file; command-line flags override
//! individual values. The result is turned into an immutable [`BackupJob`]
//! once, at startup.

use crate::archive::MemberNaming;
use crate::crypto::KeyMaterial;
use crate::executor::BackupJob;
use crate::store::StoreConfig;
use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub job: JobConfig,

    #[serde(default)]
    pub key: KeyConfig,

    pub store: StoreConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job identifier, sent to stores that track jobs
    #[serde(default = "default_job_name")]
    pub name: String,

    /// Directory to back up
    pub source_dir: PathBuf,

    /// File name of the archive
    #[serde(default = "default_archive_name")]
    pub archive_name: String,

    /// Object key in the store (defaults to the archive name)
    #[serde(default)]
    pub destination_key: Option<String>,

    /// Directory where the archive is assembled
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Member naming policy (base-name, relative-path)
    #[serde(default)]
    pub member_naming: MemberNaming,

    /// Keep the local archive after a successful upload
    #[serde(default)]
    pub keep_archive: bool,
}

/// Where the encryption key comes from. Exactly one source is used, in the
/// order hex, file, env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Hex-encoded key inline in the config file
    #[serde(default)]
    pub hex: Option<String>,

    /// File holding the raw key bytes or their hex encoding
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Environment variable holding the hex-encoded key
    #[serde(default = "default_key_env")]
    pub env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append-only run log
    #[serde(default = "default_run_log")]
    pub run_log: PathBuf,
}

// Default values
fn default_job_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "cipher-backup".to_string())
}

fn default_archive_name() -> String {
    "backup.tar".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_key_env() -> String {
    "BACKUP_ENCRYPTION_KEY".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_run_log() -> PathBuf {
    PathBuf::from("backup_log.txt")
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            hex: None,
            file: None,
            env: default_key_env(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            run_log: default_run_log(),
        }
    }
}

impl KeyConfig {
    /// Load the key material from the configured source
    pub fn load(&self) -> Result<KeyMaterial> {
        if let Some(hex) = &self.hex {
            return KeyMaterial::from_hex(hex);
        }
        if let Some(path) = &self.file {
            return KeyMaterial::from_file(path);
        }
        KeyMaterial::from_env(&self.env)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve key material and build the job for one run.
    ///
    /// `store_id` names the destination in logs and run outcomes.
    pub fn to_job(&self, store_id: &str) -> Result<BackupJob> {
        let archive_name = self.job.archive_name.trim();
        if archive_name.is_empty() || archive_name.contains(['/', '\\']) {
            return Err(BackupError::Config(format!(
                "archive name must be a plain file name, got {:?}",
                self.job.archive_name
            )));
        }

        Ok(BackupJob {
            name: self.job.name.clone(),
            source_dir: self.job.source_dir.clone(),
            key: self.key.load()?,
            archive_name: archive_name.to_string(),
            destination_key: self
                .job
                .destination_key
                .clone()
                .unwrap_or_else(|| archive_name.to_string()),
            store_id: store_id.to_string(),
            work_dir: self.job.work_dir.clone(),
            member_naming: self.job.member_naming,
            keep_archive: self.job.keep_archive,
        })
    }
}
