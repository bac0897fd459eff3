use super::types::RecordedEvent;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Appends [`RecordedEvent`]s to a JSONL file from a background task.
///
/// Cloning is cheap; all clones feed the same writer.
#[derive(Clone)]
pub struct RecordingLogger {
    sender: mpsc::UnboundedSender<RecordedEvent>,
}

impl RecordingLogger {
    /// Open (or create) the log file and spawn the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(log_file_path: PathBuf) -> Result<Self> {
        let file = open_append(&log_file_path).await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        info!("Recording events to: {}", log_file_path.display());
        tokio::spawn(writer_task(file, receiver));

        Ok(Self { sender })
    }

    pub fn record(&self, event: RecordedEvent) {
        if self.sender.send(event).is_err() {
            error!("Failed to send event to recording logger: writer task stopped");
        }
    }
}

async fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open recording log {}", path.display()))
}

async fn writer_task(mut file: File, mut receiver: mpsc::UnboundedReceiver<RecordedEvent>) {
    while let Some(event) = receiver.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize recorded event: {}", e);
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = file.write_all(line.as_bytes()).await {
            error!("Failed to write recorded event: {}", e);
            continue;
        }
        if let Err(e) = file.flush().await {
            error!("Failed to flush recording log: {}", e);
        }
    }

    info!("Recording writer task shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Direction, EventType};
    use std::time::Duration;

    #[tokio::test]
    async fn test_events_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recordings.jsonl");
        let logger = RecordingLogger::open(path.clone()).await.unwrap();

        for operation in ["GET /api", "POST /api"] {
            logger.record(RecordedEvent::now(
                "corr-1",
                EventType::FrameReceived,
                Direction::Request,
                operation,
                serde_json::Value::Null,
            ));
        }

        let mut lines = Vec::new();
        for _ in 0..50 {
            let contents = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            lines = contents.lines().map(str::to_string).collect();
            if lines.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(lines.len(), 2);
        let first: RecordedEvent = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.correlation_id, "corr-1");
        assert_eq!(first.operation, "GET /api");
        assert_eq!(first.event_type, EventType::FrameReceived);
    }
}
