//! Recording session orchestration
//!
//! - [`RecordingController`] drives the session state machine and owns the
//!   recording clock and the finalized artifact until handoff
//! - [`ChunkedEncoder`] is the contract a real media pipeline must satisfy
//! - [`ArtifactStore`] is the external storage collaborator

pub mod clock;
pub mod controller;
pub mod encoder;
pub mod state;
pub mod store;

pub use clock::RecordingClock;
pub use controller::{RecordingController, SessionHandle};
pub use encoder::{ChunkedEncoder, EncodedChunk, EncoderFactory, MemoryEncoder, MemoryEncoderFactory};
pub use state::{BlobHandle, RecordingArtifact, RecordingSession, SessionMode, SessionState};
pub use store::{ArtifactStore, MemoryArtifactStore};
