//! Broadcast Studio - live capture, composition, and recording control plane.
//!
//! This crate implements the control plane of the broadcast/record studio
//! screen: source acquisition and ownership, layout geometry, the recording
//! session state machine with pause/resume and multi-destination fan-out,
//! and guest session coordination. Actual media capture, encoding, and
//! network streaming plug in behind the [`DeviceBackend`], [`ChunkedEncoder`],
//! and [`ArtifactStore`] seams.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use broadcast_studio::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = StudioConfig::default();
//! let backend = MockDeviceBackend::new();
//! let manager = MediaSourceManager::new(backend);
//! let registry = Arc::new(StreamDestinationRegistry::new());
//! let factory = Box::new(MemoryEncoderFactory::new(Duration::from_secs(1)));
//! let mut controller = RecordingController::new(manager.clone(), registry, factory, config);
//!
//! manager.acquire_camera().await?;
//! controller.start(SessionConfig::record(LayoutConfig::new(LayoutId::Fullscreen))).await?;
//! // ...
//! let artifact = controller.stop().await?;
//! ```

pub mod config;
pub mod destinations;
pub mod error;
pub mod events;
pub mod guests;
pub mod layout;
pub mod recorder;
pub mod sources;

pub use config::{SessionConfig, StudioConfig};
pub use destinations::{DestinationId, StreamDestination, StreamDestinationRegistry};
pub use error::{ErrorResponse, StudioError, StudioResult};
pub use events::StudioEvent;
pub use guests::{GuestInvite, GuestSessionCoordinator, InviteDelivery, InviteStatus};
pub use layout::{compute_geometry, LayoutConfig, LayoutId, Placement, Rect, RenderPlan};
pub use recorder::{
    ArtifactStore, BlobHandle, ChunkedEncoder, EncodedChunk, EncoderFactory, MemoryArtifactStore,
    MemoryEncoder, MemoryEncoderFactory, RecordingArtifact, RecordingController, RecordingSession,
    SessionHandle, SessionMode, SessionState,
};
pub use sources::{
    AcquiredDevice, DeviceBackend, DeviceHandle, MediaSourceInfo, MediaSourceManager, MockDevice,
    MockDeviceBackend, SourceId, SourceKind,
};
