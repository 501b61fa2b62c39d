//! Backup run executor - sequences archive building and upload.
//!
//! A run moves through `Idle -> Building -> Uploading -> Done`; an error in
//! either working stage ends it in `Failed`. Every stage outcome is appended
//! to the run log. There is no partial success and no resumption: a failed
//! run is repeated from scratch.

pub mod outcome;

use crate::archive::{Archive, ArchiveBuilder, MemberNaming};
use crate::crypto::KeyMaterial;
use crate::store::ObjectStore;
use crate::upload::Uploader;
use crate::utils::errors::{BackupError, Result};
use crate::utils::format::{format_bytes, format_duration_ms};
use outcome::{RunEvent, RunLog, RunOutcome, RunState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Backup job configuration, fixed for the whole run
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub name: String,
    pub source_dir: PathBuf,
    pub key: KeyMaterial,
    pub archive_name: String,
    pub destination_key: String,
    pub store_id: String,
    pub work_dir: PathBuf,
    pub member_naming: MemberNaming,
    pub keep_archive: bool,
}

impl BackupJob {
    /// Where the archive is assembled before upload
    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(&self.archive_name)
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub archive_path: PathBuf,
    pub archive_bytes: u64,
    pub members: usize,
    pub plaintext_bytes: u64,
    pub destination_key: String,
    pub duration_ms: u128,
}

/// Runs one backup job against one store
pub struct Pipeline {
    job: BackupJob,
    store: Arc<dyn ObjectStore>,
    log: RunLog,
    state: RunState,
    run_id: Uuid,
}

impl Pipeline {
    pub fn new(job: BackupJob, store: Arc<dyn ObjectStore>, log: RunLog) -> Self {
        Self {
            job,
            store,
            log,
            state: RunState::Idle,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Execute the run: build the archive, then upload it.
    ///
    /// A pipeline runs once; later calls fail without touching the store.
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.state != RunState::Idle {
            return Err(BackupError::Config(format!(
                "run {} already {}",
                self.run_id, self.state
            )));
        }

        let start_time = Instant::now();
        info!(
            "Starting backup run {} for job {}: {} -> {}",
            self.run_id,
            self.job.name,
            self.job.source_dir.display(),
            self.job.store_id
        );

        self.state = RunState::Building;
        let built = self.build_archive().await;
        let archive = match built {
            Ok(archive) => archive,
            Err(e) => return Err(self.fail(e)),
        };
        self.record(RunEvent::ArchiveCreated {
            archive: self.job.archive_name.clone(),
            members: archive.members.len(),
            size: archive.size,
        })?;

        self.state = RunState::Uploading;
        let uploaded = Uploader::new(self.store.as_ref())
            .upload(&archive.path, &self.job.destination_key)
            .await;
        if let Err(e) = uploaded {
            return Err(self.fail(e));
        }
        self.record(RunEvent::UploadCompleted {
            archive: self.job.archive_name.clone(),
            key: self.job.destination_key.clone(),
            store: self.job.store_id.clone(),
        })?;

        self.record(RunEvent::RunCompleted {
            archive: self.job.archive_name.clone(),
            key: self.job.destination_key.clone(),
            store: self.job.store_id.clone(),
        })?;
        self.state = RunState::Done;

        if !self.job.keep_archive {
            remove_archive(&archive.path);
        }

        let duration_ms = start_time.elapsed().as_millis();
        info!(
            "Backup run {} done: {} files ({}) in {}",
            self.run_id,
            archive.members.len(),
            format_bytes(archive.plaintext_bytes),
            format_duration_ms(duration_ms)
        );

        Ok(RunReport {
            run_id: self.run_id,
            archive_path: archive.path,
            archive_bytes: archive.size,
            members: archive.members.len(),
            plaintext_bytes: archive.plaintext_bytes,
            destination_key: self.job.destination_key.clone(),
            duration_ms,
        })
    }

    /// Build the archive on a blocking worker; the run waits for it.
    async fn build_archive(&self) -> Result<Archive> {
        let key = self.job.key.clone();
        let naming = self.job.member_naming;
        let run_log = self.log.path().to_path_buf();
        let source = self.job.source_dir.clone();
        let output = self.job.archive_path();

        tokio::task::spawn_blocking(move || {
            ArchiveBuilder::new(key.as_bytes())
                .with_naming(naming)
                .skip_path(run_log)
                .build(&source, &output)
        })
        .await
        .map_err(|e| BackupError::ArchiveWrite(format!("archive task failed: {}", e)))?
    }

    /// Append a stage outcome; a log that cannot be written fails the run.
    fn record(&mut self, event: RunEvent) -> Result<()> {
        let outcome = RunOutcome::new(self.run_id, event);
        match self.log.record(&outcome) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(BackupError::Io(e))),
        }
    }

    /// Move to `Failed` and log the cause verbatim.
    fn fail(&mut self, err: BackupError) -> BackupError {
        let stage = self.state;
        self.state = RunState::Failed;

        let outcome = RunOutcome::new(
            self.run_id,
            RunEvent::RunFailed {
                stage,
                error: err.to_string(),
            },
        );
        if let Err(log_err) = self.log.record(&outcome) {
            warn!(
                "Failed to write run log {}: {}",
                self.log.path().display(),
                log_err
            );
        }

        err
    }
}

fn remove_archive(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed local archive {}", path.display()),
        Err(e) => warn!("Failed to remove local archive {}: {}", path.display(), e),
    }
}
