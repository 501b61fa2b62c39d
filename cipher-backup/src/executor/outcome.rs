//! Run outcomes and the durable run log.
//!
//! The run log is an append-only text file with one `<timestamp> - <message>`
//! line per event. It is flushed after every line and is separate from the
//! diagnostic `tracing` output (every line is mirrored there too).

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Pipeline state of a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Building,
    Uploading,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Building => "building",
            RunState::Uploading => "uploading",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened at the end of a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    ArchiveCreated {
        archive: String,
        members: usize,
        size: u64,
    },
    UploadCompleted {
        archive: String,
        key: String,
        store: String,
    },
    RunCompleted {
        archive: String,
        key: String,
        store: String,
    },
    RunFailed {
        stage: RunState,
        error: String,
    },
    /// Configuration, key or store setup failed before the pipeline existed
    StartupFailed {
        error: String,
    },
}

/// One entry of the run log
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub timestamp: DateTime<Local>,
    pub event: RunEvent,
}

impl RunOutcome {
    pub fn new(run_id: Uuid, event: RunEvent) -> Self {
        Self {
            run_id,
            timestamp: Local::now(),
            event,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.event,
            RunEvent::RunFailed { .. } | RunEvent::StartupFailed { .. }
        )
    }

    /// Log line text, without the timestamp
    pub fn message(&self) -> String {
        match &self.event {
            RunEvent::ArchiveCreated {
                archive,
                members,
                size,
            } => format!(
                "Created archive: {} ({} members, {} bytes)",
                archive, members, size
            ),
            RunEvent::UploadCompleted {
                archive,
                key,
                store,
            } => format!("Uploaded {} to {} as {}", archive, store, key),
            RunEvent::RunCompleted {
                archive,
                key,
                store,
            } => format!(
                "Backup run {} completed successfully: {} stored at {} as {}",
                self.run_id, archive, store, key
            ),
            RunEvent::RunFailed { stage, error } => {
                format!("Backup run {} failed while {}: {}", self.run_id, stage, error)
            }
            RunEvent::StartupFailed { error } => {
                format!("Backup run {} could not start: {}", self.run_id, error)
            }
        }
    }
}

/// Append-only, line-oriented log of run outcomes
pub struct RunLog {
    file: File,
    path: PathBuf,
}

impl RunLog {
    /// Open (or create) the log at `path` for appending
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one outcome and flush it to disk
    pub fn record(&mut self, outcome: &RunOutcome) -> std::io::Result<()> {
        let message = outcome.message();
        if outcome.is_failure() {
            tracing::error!("{}", message);
        } else {
            tracing::info!("{}", message);
        }

        let line = format!(
            "{} - {}\n",
            outcome.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            message
        );
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/backup_log.txt");
        let run_id = Uuid::new_v4();

        {
            let mut log = RunLog::open(&path).unwrap();
            log.record(&RunOutcome::new(
                run_id,
                RunEvent::ArchiveCreated {
                    archive: "backup.tar".into(),
                    members: 2,
                    size: 10240,
                },
            ))
            .unwrap();
        }

        // Reopening appends rather than truncating.
        let mut log = RunLog::open(&path).unwrap();
        log.record(&RunOutcome::new(
            run_id,
            RunEvent::RunFailed {
                stage: RunState::Uploading,
                error: "Upload error: timeout".into(),
            },
        ))
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - Created archive: backup.tar (2 members, 10240 bytes)"));
        assert!(lines[1].contains(&format!("Backup run {} failed while uploading", run_id)));
        assert!(lines[1].ends_with("Upload error: timeout"));
    }

    #[test]
    fn test_timestamp_prefix() {
        let outcome = RunOutcome::new(
            Uuid::nil(),
            RunEvent::UploadCompleted {
                archive: "backup.tar".into(),
                key: "backup.tar".into(),
                store: "s3://bucket".into(),
            },
        );
        assert_eq!(
            outcome.message(),
            "Uploaded backup.tar to s3://bucket as backup.tar"
        );
        assert!(!outcome.is_failure());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");
        RunLog::open(&path).unwrap().record(&outcome).unwrap();

        let line = std::fs::read_to_string(&path).unwrap();
        let (stamp, rest) = line.split_once(" - ").unwrap();
        let (seconds, millis) = stamp.split_once(',').unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(seconds, "%Y-%m-%d %H:%M:%S").is_ok());
        assert_eq!(millis.len(), 3);
        assert_eq!(rest.trim_end(), outcome.message());
    }

    #[test]
    fn test_startup_failure_is_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup_log.txt");
        let run_id = Uuid::new_v4();

        let outcome = RunOutcome::new(
            run_id,
            RunEvent::StartupFailed {
                error: "environment variable BACKUP_ENCRYPTION_KEY not set".into(),
            },
        );
        assert!(outcome.is_failure());
        RunLog::open(&path).unwrap().record(&outcome).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.trim_end().ends_with(&format!(
            "Backup run {} could not start: environment variable BACKUP_ENCRYPTION_KEY not set",
            run_id
        )));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::Building.to_string(), "building");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }
}
