//! Artifact handoff to the external storage collaborator

use crate::error::StudioResult;
use crate::recorder::state::RecordingArtifact;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// External storage collaborator for finished artifacts.
///
/// Persisting or uploading the blob is entirely the collaborator's concern;
/// the controller only transfers ownership of the finalized artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store(&self, artifact: RecordingArtifact) -> StudioResult<()>;
}

/// In-memory [`ArtifactStore`] used by tests and headless preview
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<Vec<RecordingArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn artifacts(&self) -> Vec<RecordingArtifact> {
        self.artifacts.lock().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, artifact: RecordingArtifact) -> StudioResult<()> {
        tracing::debug!(session_id = %artifact.session_id, "artifact stored");
        self.artifacts.lock().push(artifact);
        Ok(())
    }
}
