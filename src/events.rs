//! Events emitted by the studio control plane
//!
//! Events are non-fatal notifications: the session keeps running after any
//! of them. Subscribe via [`RecordingController::subscribe`] to drive UI
//! state or logging.
//!
//! [`RecordingController::subscribe`]: crate::recorder::RecordingController::subscribe

use crate::destinations::DestinationId;
use crate::sources::SourceId;
use uuid::Uuid;

/// Events emitted during a studio session
#[derive(Debug, Clone)]
pub enum StudioEvent {
    /// A recording session entered the Recording state
    SessionStarted { session_id: Uuid },
    /// The live session was paused
    SessionPaused { session_id: Uuid },
    /// The paused session resumed recording
    SessionResumed { session_id: Uuid },
    /// The session finalized into exactly one artifact
    SessionCompleted { session_id: Uuid, duration_ms: u64 },
    /// The session failed and requires an explicit reset
    SessionFailed {
        session_id: Option<Uuid>,
        reason: String,
    },
    /// An active source ended outside our control; the composite continues
    /// with the remaining sources. Emitted exactly once per loss.
    SourceLost { source_id: SourceId },
    /// One encoded chunk was submitted to the current fan-out set
    ChunkFanOut {
        seq: u64,
        destination_ids: Vec<DestinationId>,
    },
    /// Guest invite email delivery failed; the invite itself is unaffected
    InviteDeliveryFailed { invite_id: Uuid, reason: String },
}
