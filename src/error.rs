//! Error types and handling
//!
//! One structured error enum for the whole control plane. Every variant
//! carries enough context (which source, destination, or guest) for the
//! operator to act on it; none of them are retried silently.

use crate::destinations::DestinationId;
use crate::guests::InviteStatus;
use crate::recorder::state::SessionState;
use crate::sources::{SourceId, SourceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Control-plane error type
#[derive(Error, Debug, Clone)]
pub enum StudioError {
    // Device errors: recoverable, the operator retries.
    #[error("permission denied for {kind} capture (check OS settings)")]
    PermissionDenied { kind: SourceKind },

    #[error("no {kind} device found")]
    DeviceNotFound { kind: SourceKind },

    #[error("{kind} device is in use by another application")]
    DeviceInUse { kind: SourceKind },

    /// The slot was released while acquisition was still suspended on a
    /// permission prompt. The late handle has already been stopped.
    #[error("{kind} acquisition was cancelled before it completed")]
    AcquisitionCancelled { kind: SourceKind },

    #[error("unknown media source: {id}")]
    UnknownSource { id: SourceId },

    // Session errors: the session remains (or returns to) Idle.
    #[error("cannot start a session without an active media source")]
    NoActiveSource,

    #[error("encoder initialization failed: {reason}")]
    EncoderInitFailure { reason: String },

    #[error("encoder failed during {operation}: {reason}")]
    EncoderFailure {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} is not legal in the {state} state")]
    InvalidSessionState {
        operation: &'static str,
        state: SessionState,
    },

    // Configuration errors: rejected synchronously, never partially applied.
    #[error("invalid destination config for '{name}': empty {fields:?}")]
    InvalidDestinationConfig {
        name: String,
        fields: Vec<&'static str>,
    },

    #[error("unknown stream destination: {id}")]
    UnknownDestination { id: DestinationId },

    // Guest roster errors.
    #[error("unknown guest invite token")]
    UnknownInvite { token: String },

    #[error("guest invite is {status} and cannot transition")]
    InviteNotJoinable { token: String, status: InviteStatus },

    /// Delivery is fire-and-forget; this never fails invite creation and is
    /// surfaced as a non-blocking warning.
    #[error("guest invite delivery failed: {reason}")]
    InviteDeliveryFailure { invite_id: Uuid, reason: String },
}

impl StudioError {
    /// Stable error code for operator-facing surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            StudioError::PermissionDenied { .. } => "PERMISSION_DENIED",
            StudioError::DeviceNotFound { .. } => "DEVICE_NOT_FOUND",
            StudioError::DeviceInUse { .. } => "DEVICE_IN_USE",
            StudioError::AcquisitionCancelled { .. } => "ACQUISITION_CANCELLED",
            StudioError::UnknownSource { .. } => "UNKNOWN_SOURCE",
            StudioError::NoActiveSource => "NO_ACTIVE_SOURCE",
            StudioError::EncoderInitFailure { .. } => "ENCODER_INIT_FAILURE",
            StudioError::EncoderFailure { .. } => "ENCODER_FAILURE",
            StudioError::InvalidSessionState { .. } => "INVALID_SESSION_STATE",
            StudioError::InvalidDestinationConfig { .. } => "INVALID_DESTINATION_CONFIG",
            StudioError::UnknownDestination { .. } => "UNKNOWN_DESTINATION",
            StudioError::UnknownInvite { .. } => "UNKNOWN_INVITE",
            StudioError::InviteNotJoinable { .. } => "INVITE_NOT_JOINABLE",
            StudioError::InviteDeliveryFailure { .. } => "INVITE_DELIVERY_FAILURE",
        }
    }
}

/// Error response for operator-facing surfaces
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<StudioError> for ErrorResponse {
    fn from(error: StudioError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using StudioError
pub type StudioResult<T> = Result<T, StudioError>;
