//! Recording controller
//!
//! Orchestrates the source manager, layout engine, chunked encoder, and
//! destination registry into one session state machine. All transitions are
//! serialized through `&mut self`; suspending work (encoder init/finalize)
//! never holds a lock, and completions of background tasks are delivered
//! back through channels.

use crate::config::{SessionConfig, StudioConfig};
use crate::destinations::{DestinationId, StreamDestinationRegistry};
use crate::error::{StudioError, StudioResult};
use crate::events::StudioEvent;
use crate::layout::{self, LayoutConfig};
use crate::recorder::clock::RecordingClock;
use crate::recorder::encoder::{ChunkedEncoder, EncodedChunk, EncoderFactory};
use crate::recorder::state::{RecordingArtifact, RecordingSession, SessionMode, SessionState};
use crate::recorder::store::ArtifactStore;
use crate::sources::{MediaSourceInfo, MediaSourceManager, SourceId, SourceKind};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct ControllerShared {
    state: SessionState,
    session: Option<RecordingSession>,
}

/// Narrow hook handed to the source manager so that releasing or losing a
/// device keeps the live session's `active_source_ids` consistent. The one
/// place state crosses component boundaries.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<RwLock<ControllerShared>>,
    event_tx: broadcast::Sender<StudioEvent>,
}

impl SessionHandle {
    fn remove_active(&self, source_id: SourceId) -> bool {
        let mut shared = self.shared.write();
        match shared.session.as_mut() {
            Some(session) => {
                let before = session.active_source_ids.len();
                session.active_source_ids.retain(|id| *id != source_id);
                session.active_source_ids.len() != before
            }
            None => false,
        }
    }

    /// The source was released by the operator; drop it from the active set
    /// atomically with the release.
    pub fn notify_source_released(&self, source_id: SourceId) {
        if self.remove_active(source_id) {
            tracing::debug!(%source_id, "released source removed from live session");
        }
    }

    /// The source ended outside our control mid-session. The composite
    /// continues with the remaining sources; exactly one notification is
    /// emitted per loss event.
    pub fn notify_source_lost(&self, source_id: SourceId) {
        if self.remove_active(source_id) {
            tracing::warn!(%source_id, "source lost mid-session; continuing degraded");
            let _ = self
                .event_tx
                .send(StudioEvent::SourceLost { source_id });
        }
    }
}

/// Drives the recording session state machine and owns the recording clock
/// and the finalized artifact until handoff.
pub struct RecordingController {
    shared: Arc<RwLock<ControllerShared>>,
    manager: Arc<MediaSourceManager>,
    registry: Arc<StreamDestinationRegistry>,
    encoder_factory: Box<dyn EncoderFactory>,
    store: Option<Arc<dyn ArtifactStore>>,
    config: StudioConfig,
    event_tx: broadcast::Sender<StudioEvent>,
    encoder: Option<Box<dyn ChunkedEncoder>>,
    pump: Option<JoinHandle<()>>,
    fan_out_counts: Arc<RwLock<HashMap<DestinationId, u64>>>,
    clock: RecordingClock,
}

impl RecordingController {
    /// Creates a controller bound to the given source manager and
    /// destination registry, and installs the session hook on the manager.
    pub fn new(
        manager: Arc<MediaSourceManager>,
        registry: Arc<StreamDestinationRegistry>,
        encoder_factory: Box<dyn EncoderFactory>,
        config: StudioConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let shared = Arc::new(RwLock::new(ControllerShared {
            state: SessionState::Idle,
            session: None,
        }));

        let controller = Self {
            shared,
            manager,
            registry,
            encoder_factory,
            store: None,
            config,
            event_tx,
            encoder: None,
            pump: None,
            fan_out_counts: Arc::new(RwLock::new(HashMap::new())),
            clock: RecordingClock::default(),
        };
        controller.manager.bind_session(controller.session_hook());
        controller
    }

    /// Registers the storage collaborator that receives finalized artifacts.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The narrow hook the source manager calls on release/loss.
    pub fn session_hook(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.event_tx.subscribe()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.read().state
    }

    /// Snapshot of the live session, if any.
    pub fn session(&self) -> Option<RecordingSession> {
        self.shared.read().session.clone()
    }

    /// Recorded duration so far in milliseconds, excluding paused time.
    /// Driven by the wall clock, never by chunk count.
    pub fn duration_ms(&self) -> u64 {
        self.clock.elapsed_ms()
    }

    /// Chunks delivered per destination during the current session.
    pub fn fan_out_counts(&self) -> HashMap<DestinationId, u64> {
        self.fan_out_counts.read().clone()
    }

    /// Starts a recording session over the currently active sources.
    ///
    /// Fails with [`StudioError::NoActiveSource`] when nothing is acquired
    /// and with [`StudioError::EncoderInitFailure`] when the encoder cannot
    /// be created; in both cases the session stays Idle, never
    /// partially initialized.
    pub async fn start(&mut self, session_config: SessionConfig) -> StudioResult<Uuid> {
        {
            let state = self.shared.read().state;
            if state != SessionState::Idle {
                return Err(StudioError::InvalidSessionState {
                    operation: "start",
                    state,
                });
            }
        }

        let active = self.manager.active_sources();
        if active.is_empty() {
            return Err(StudioError::NoActiveSource);
        }

        self.shared.write().state = SessionState::Armed;

        let layout = effective_layout(session_config.layout, &active);
        let active_ids: Vec<SourceId> = active.iter().map(|s| s.id).collect();
        let plan = layout::compute_geometry(&layout, &active_ids);

        let mut encoder = match self.encoder_factory.create(&self.config.mime_type) {
            Ok(encoder) => encoder,
            Err(error) => {
                self.shared.write().state = SessionState::Idle;
                tracing::error!(error = %error, "encoder initialization failed");
                return Err(error);
            }
        };

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        if let Err(error) = encoder.start(plan, chunk_tx).await {
            self.shared.write().state = SessionState::Idle;
            tracing::error!(error = %error, "encoder failed to arm");
            return Err(error);
        }

        let session_id = Uuid::new_v4();
        self.fan_out_counts.write().clear();
        self.pump = Some(tokio::spawn(pump_chunks(
            chunk_rx,
            session_config.mode,
            self.registry.clone(),
            self.event_tx.clone(),
            self.fan_out_counts.clone(),
        )));
        self.encoder = Some(encoder);
        self.clock.start();

        {
            let mut shared = self.shared.write();
            shared.session = Some(RecordingSession {
                id: session_id,
                mode: session_config.mode,
                started_at: Utc::now(),
                paused_duration_ms: 0,
                active_source_ids: active_ids,
                layout,
                background_id: session_config.background_id,
            });
            shared.state = SessionState::Recording;
        }

        let _ = self.event_tx.send(StudioEvent::SessionStarted { session_id });
        tracing::info!(%session_id, mode = ?session_config.mode, sources = active.len(), "recording started");
        Ok(session_id)
    }

    /// Pauses the live session. The encoder is toggled, not destroyed, and
    /// device handles are never released by pausing.
    pub async fn pause(&mut self) -> StudioResult<()> {
        let (state, session_id) = self.state_and_id();
        if state != SessionState::Recording {
            return Err(StudioError::InvalidSessionState {
                operation: "pause",
                state,
            });
        }

        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(error) = encoder.pause().await {
                self.fail(error.to_string());
                return Err(error);
            }
        }
        self.clock.pause();
        self.shared.write().state = SessionState::Paused;

        if let Some(session_id) = session_id {
            let _ = self.event_tx.send(StudioEvent::SessionPaused { session_id });
        }
        tracing::info!("recording paused");
        Ok(())
    }

    /// Resumes a paused session.
    pub async fn resume(&mut self) -> StudioResult<()> {
        let (state, session_id) = self.state_and_id();
        if state != SessionState::Paused {
            return Err(StudioError::InvalidSessionState {
                operation: "resume",
                state,
            });
        }

        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(error) = encoder.resume().await {
                self.fail(error.to_string());
                return Err(error);
            }
        }
        self.clock.resume();
        self.shared.write().state = SessionState::Recording;

        if let Some(session_id) = session_id {
            let _ = self.event_tx.send(StudioEvent::SessionResumed { session_id });
        }
        tracing::info!("recording resumed");
        Ok(())
    }

    /// Stops the session and finalizes the encoder into exactly one
    /// artifact. A no-op while Idle. Device handles stay live for a
    /// possible next take; only the encoder is released.
    pub async fn stop(&mut self) -> StudioResult<Option<RecordingArtifact>> {
        let (state, _) = self.state_and_id();
        match state {
            SessionState::Idle => {
                tracing::debug!("stop called while idle; nothing to do");
                return Ok(None);
            }
            SessionState::Recording | SessionState::Paused => {}
            other => {
                return Err(StudioError::InvalidSessionState {
                    operation: "stop",
                    state: other,
                });
            }
        }

        self.shared.write().state = SessionState::Stopping;
        let duration = self.clock.stop();

        let Some(mut encoder) = self.encoder.take() else {
            self.fail("encoder missing from live session".to_string());
            return Err(StudioError::EncoderFailure {
                operation: "finalize",
                reason: "encoder missing from live session".to_string(),
            });
        };

        let blob_handle = match encoder.finalize().await {
            Ok(blob) => blob,
            Err(error) => {
                self.fail(error.to_string());
                return Err(error);
            }
        };
        drop(encoder);

        // Finalize closed the chunk channel; wait for the pump to drain
        // whatever was still queued so no chunk misses the fan-out set.
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }

        let session_id = {
            let mut shared = self.shared.write();
            let paused_ms = self.clock.paused_ms();
            let session = shared.session.as_mut();
            if let Some(session) = session {
                session.paused_duration_ms = paused_ms;
            }
            shared.state = SessionState::Completed;
            shared.session.as_ref().map(|s| s.id).unwrap_or_default()
        };

        let artifact = RecordingArtifact {
            session_id,
            blob_handle,
            duration_ms: duration.as_millis() as u64,
            mime_type: self.config.mime_type.clone(),
        };

        let _ = self.event_tx.send(StudioEvent::SessionCompleted {
            session_id,
            duration_ms: artifact.duration_ms,
        });

        // Ownership of the finalized artifact transfers to the storage
        // collaborator; a handoff failure is logged but cannot un-complete
        // the session.
        if let Some(store) = &self.store {
            if let Err(error) = store.store(artifact.clone()).await {
                tracing::error!(%session_id, error = %error, "artifact handoff failed");
            }
        }

        {
            let mut shared = self.shared.write();
            shared.session = None;
            shared.state = SessionState::Idle;
        }

        tracing::info!(%session_id, duration_ms = artifact.duration_ms, "recording stopped");
        Ok(Some(artifact))
    }

    /// Clears a failed session back to Idle.
    pub fn reset(&mut self) -> StudioResult<()> {
        let mut shared = self.shared.write();
        if shared.state != SessionState::Failed {
            return Err(StudioError::InvalidSessionState {
                operation: "reset",
                state: shared.state,
            });
        }
        shared.session = None;
        shared.state = SessionState::Idle;
        tracing::info!("failed session cleared");
        Ok(())
    }

    fn state_and_id(&self) -> (SessionState, Option<Uuid>) {
        let shared = self.shared.read();
        (shared.state, shared.session.as_ref().map(|s| s.id))
    }

    fn fail(&mut self, reason: String) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.encoder = None;
        self.clock.stop();
        let session_id = {
            let mut shared = self.shared.write();
            shared.state = SessionState::Failed;
            shared.session.as_ref().map(|s| s.id)
        };
        tracing::error!(?session_id, %reason, "session failed");
        let _ = self
            .event_tx
            .send(StudioEvent::SessionFailed { session_id, reason });
    }
}

/// Default primary for a non-split layout: whichever source the operator
/// last marked primary, else screen if present, else camera.
fn effective_layout(mut layout: LayoutConfig, active: &[MediaSourceInfo]) -> LayoutConfig {
    let primary_active = layout
        .primary_source_id
        .is_some_and(|id| active.iter().any(|s| s.id == id));
    if !primary_active {
        layout.primary_source_id = active
            .iter()
            .find(|s| s.kind == SourceKind::Screen)
            .or_else(|| active.first())
            .map(|s| s.id);
    }
    layout
}

/// Forwards encoded chunks to the fan-out set. The registry is consulted on
/// every chunk, so enabling or disabling a destination mid-session takes
/// effect on the next chunk without stopping the session.
async fn pump_chunks(
    mut chunks: mpsc::Receiver<EncodedChunk>,
    mode: SessionMode,
    registry: Arc<StreamDestinationRegistry>,
    event_tx: broadcast::Sender<StudioEvent>,
    fan_out_counts: Arc<RwLock<HashMap<DestinationId, u64>>>,
) {
    while let Some(chunk) = chunks.recv().await {
        if mode != SessionMode::Stream {
            continue;
        }
        let destination_ids: Vec<DestinationId> = registry
            .enabled_destinations()
            .iter()
            .map(|d| d.id)
            .collect();
        if destination_ids.is_empty() {
            continue;
        }
        {
            let mut counts = fan_out_counts.write();
            for id in &destination_ids {
                *counts.entry(*id).or_insert(0) += 1;
            }
        }
        tracing::trace!(seq = chunk.seq, destinations = destination_ids.len(), "chunk fan-out");
        let _ = event_tx.send(StudioEvent::ChunkFanOut {
            seq: chunk.seq,
            destination_ids,
        });
    }
}
