use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entry::AuditEntry;
use crate::writer::{AuditWriteError, AuditWriter};

const CHANNEL_BUFFER: usize = 1024;

/// Idle time after which pending writes are flushed.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Cloneable handle for submitting [`AuditEntry`] values to the background
/// writer task.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEntry>,
}

impl AuditSink {
    /// Open the log at `path` and spawn the writer task.
    ///
    /// The task exits after a final flush once every `AuditSink` clone has
    /// been dropped; await the returned handle to be sure the trail is on
    /// disk. Write errors are logged and the entry skipped.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), AuditWriteError> {
        let (tx, rx) = mpsc::channel::<AuditEntry>(CHANNEL_BUFFER);
        let writer = AuditWriter::new(path).await?;
        let handle = tokio::spawn(run_writer_loop(writer, rx));
        Ok((Self { tx }, handle))
    }

    /// Queue an entry, waiting for channel space if needed.
    pub async fn log(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.send(entry).await {
            tracing::warn!(
                event_type = ?err.0.event_type,
                "audit writer has stopped, entry dropped"
            );
        }
    }

    /// Queue an entry without waiting. For use from synchronous callbacks;
    /// the entry is dropped when the channel is full.
    pub fn try_log(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.try_send(entry) {
            let entry = match err {
                mpsc::error::TrySendError::Full(e) | mpsc::error::TrySendError::Closed(e) => e,
            };
            tracing::warn!(event_type = ?entry.event_type, "audit channel unavailable, entry dropped");
        }
    }
}

async fn run_writer_loop(mut writer: AuditWriter, mut rx: mpsc::Receiver<AuditEntry>) {
    let mut dirty = false;

    loop {
        match tokio::time::timeout(FLUSH_INTERVAL, rx.recv()).await {
            Ok(Some(entry)) => match writer.write(&entry).await {
                Ok(()) => dirty = true,
                Err(err) => tracing::error!(%err, "failed to write audit entry"),
            },
            Ok(None) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "failed to flush audit log on shutdown");
                    }
                }
                tracing::debug!("audit writer shutting down");
                return;
            }
            Err(_) if dirty => match writer.flush().await {
                Ok(()) => dirty = false,
                Err(err) => tracing::error!(%err, "periodic audit log flush failed"),
            },
            Err(_) => {}
        }
    }
}
