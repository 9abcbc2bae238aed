//! Recording state machine and session types

use crate::layout::LayoutConfig;
use crate::sources::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// State of the recording session
///
/// The sole mutation path for session liveness: every transition goes
/// through [`RecordingController`](crate::recorder::RecordingController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session in progress
    Idle,
    /// Encoder initialization in flight; never observable after a failure
    Armed,
    /// Currently recording
    Recording,
    /// Recording is paused; device handles stay live
    Paused,
    /// Encoder finalize in flight
    Stopping,
    /// Artifact finalized; immediately resets to Idle
    Completed,
    /// A non-recoverable failure; cleared by an explicit reset
    Failed,
}

impl SessionState {
    /// Recording or Paused: a session that holds the studio instance.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Armed => "armed",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Session mode: local artifact only, or local artifact plus fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Record,
    Stream,
}

/// One live recording session. At most one per studio instance may be in a
/// live state at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: Uuid,
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
    /// Total wall time spent paused, filled in on stop
    pub paused_duration_ms: u64,
    /// Sources currently feeding the composite. Kept consistent with the
    /// source manager: no id survives its device handle.
    pub active_source_ids: Vec<SourceId>,
    pub layout: LayoutConfig,
    pub background_id: Option<String>,
}

/// Opaque reference to the assembled recording bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobHandle {
    pub id: Uuid,
    pub size_bytes: u64,
    pub chunk_count: u64,
}

/// Finalized output of a completed session. Produced exactly once;
/// immutable after finalization; ownership transfers to the storage
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingArtifact {
    pub session_id: Uuid,
    pub blob_handle: BlobHandle,
    pub duration_ms: u64,
    pub mime_type: String,
}
