//! Export artifact delivery
//!
//! In the browser original the serialized CSV became an object URL handed
//! to the download anchor and revoked a few seconds later. The sink trait
//! keeps that shape: deliver an artifact, get a handle back, release the
//! handle after the orchestrator's cleanup delay.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

/// One serialized export ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub content: String,
}

/// Opaque reference to a delivered artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to deliver '{filename}': {message}")]
    Delivery { filename: String, message: String },
}

/// Destination for serialized exports.
///
/// `release` must be idempotent; the orchestrator calls it once per
/// delivered artifact after a fixed delay.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn deliver(&self, artifact: ExportArtifact) -> Result<ArtifactHandle, SinkError>;

    async fn release(&self, handle: ArtifactHandle);
}

/// Writes artifacts into a target directory.
pub struct FileSystemSink {
    directory: PathBuf,
}

impl FileSystemSink {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl ExportSink for FileSystemSink {
    async fn deliver(&self, artifact: ExportArtifact) -> Result<ArtifactHandle, SinkError> {
        let path = self.directory.join(&artifact.filename);
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| SinkError::Delivery {
                filename: artifact.filename.clone(),
                message: e.to_string(),
            })?;
        tokio::fs::write(&path, artifact.content.as_bytes())
            .await
            .map_err(|e| SinkError::Delivery {
                filename: artifact.filename.clone(),
                message: e.to_string(),
            })?;

        debug!(path = %path.display(), "export written");
        Ok(ArtifactHandle(path.display().to_string()))
    }

    async fn release(&self, handle: ArtifactHandle) {
        // Files persist for the user; releasing only logs the handoff.
        debug!(handle = %handle.0, "artifact released");
    }
}

/// In-memory sink for tests and the sanity binary.
#[derive(Default)]
pub struct MemorySink {
    delivered: std::sync::Mutex<Vec<ExportArtifact>>,
    released: std::sync::Mutex<Vec<ArtifactHandle>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn delivered(&self) -> Vec<ExportArtifact> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn released(&self) -> Vec<ArtifactHandle> {
        self.released.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn deliver(&self, artifact: ExportArtifact) -> Result<ArtifactHandle, SinkError> {
        let handle = ArtifactHandle(artifact.filename.clone());
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(artifact),
            Err(_) => warn!("memory sink poisoned, dropping artifact"),
        }
        Ok(handle)
    }

    async fn release(&self, handle: ArtifactHandle) {
        if let Ok(mut released) = self.released.lock() {
            released.push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filesystem_sink_writes_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSystemSink::new(dir.path());

        let handle = sink
            .deliver(ExportArtifact {
                filename: "bestellung-4711.csv".into(),
                content: "HAN;menge\r\n".into(),
            })
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("bestellung-4711.csv")).unwrap();
        assert_eq!(written, "HAN;menge\r\n");
        sink.release(handle).await;
    }

    #[tokio::test]
    async fn memory_sink_tracks_delivery_and_release() {
        let sink = MemorySink::new();
        let handle = sink
            .deliver(ExportArtifact {
                filename: "a.csv".into(),
                content: String::new(),
            })
            .await
            .unwrap();
        sink.release(handle.clone()).await;

        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(sink.released(), vec![handle]);
    }
}
