use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::entry::AuditEntry;

#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("failed to create audit log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open audit log {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write to audit log: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to flush audit log: {0}")]
    Flush(#[source] std::io::Error),
}

/// Appends [`AuditEntry`] values to a file, one JSON object per line.
pub struct AuditWriter {
    path: PathBuf,
    file: tokio::fs::File,
}

impl AuditWriter {
    /// Open `path` for appending, creating it and its parent directories
    /// as needed.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, AuditWriteError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AuditWriteError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| AuditWriteError::OpenFile {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&mut self, entry: &AuditEntry) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .await
            .map_err(AuditWriteError::Write)
    }

    pub async fn flush(&mut self) -> Result<(), AuditWriteError> {
        self.file.flush().await.map_err(AuditWriteError::Flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditEventType, DecisionOutcome, ValidationDecisionRecord};

    #[tokio::test]
    async fn one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AuditWriter::new(dir.path().join("a.jsonl")).await.unwrap();

        writer
            .write(&AuditEntry::for_decision(
                "validator",
                ValidationDecisionRecord::rejected(
                    "/x",
                    "data",
                    "no_matching_rule",
                    "no data rule matches /x",
                ),
            ))
            .await
            .unwrap();
        writer
            .write(&AuditEntry::new(
                AuditEventType::ProcessStopped,
                "ndn-validate",
                serde_json::Value::Null,
            ))
            .await
            .unwrap();
        writer.flush().await.unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.decision.unwrap().outcome, DecisionOutcome::Rejected);
    }

    #[tokio::test]
    async fn unwritable_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = AuditWriter::new(blocker.join("audit.jsonl"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuditWriteError::CreateDir { .. }), "{err}");
    }
}
