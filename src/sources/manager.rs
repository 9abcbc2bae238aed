//! Media source manager
//!
//! Owns every live device handle. One slot per source kind; acquisition is
//! asynchronous and may suspend on a permission prompt, so each slot carries
//! an epoch counter: a completion whose epoch no longer matches is a stale
//! result and its tracks are stopped instead of installed.

use super::device::{DeviceBackend, DeviceHandle, SourceId, SourceKind};
use crate::error::{StudioError, StudioResult};
use crate::recorder::controller::SessionHandle;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Snapshot of an acquired media source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSourceInfo {
    pub id: SourceId,
    pub kind: SourceKind,
    pub label: String,
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

struct HeldSource {
    id: SourceId,
    kind: SourceKind,
    label: String,
    audio_enabled: bool,
    video_enabled: bool,
    handle: Box<dyn DeviceHandle>,
}

impl HeldSource {
    fn info(&self) -> MediaSourceInfo {
        MediaSourceInfo {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
            audio_enabled: self.audio_enabled,
            video_enabled: self.video_enabled,
        }
    }
}

#[derive(Default)]
struct Slot {
    epoch: u64,
    source: Option<HeldSource>,
}

#[derive(Default)]
struct Slots {
    camera: Slot,
    screen: Slot,
}

impl Slots {
    fn slot_mut(&mut self, kind: SourceKind) -> &mut Slot {
        match kind {
            SourceKind::Camera => &mut self.camera,
            SourceKind::Screen => &mut self.screen,
        }
    }

    fn slot(&self, kind: SourceKind) -> &Slot {
        match kind {
            SourceKind::Camera => &self.camera,
            SourceKind::Screen => &self.screen,
        }
    }

    fn find_mut(&mut self, id: SourceId) -> Option<&mut Slot> {
        [&mut self.camera, &mut self.screen]
            .into_iter()
            .find(|slot| slot.source.as_ref().is_some_and(|s| s.id == id))
    }
}

/// Acquires and exclusively owns camera and screen-share device handles
pub struct MediaSourceManager {
    backend: Arc<dyn DeviceBackend>,
    slots: RwLock<Slots>,
    hook: RwLock<Option<SessionHandle>>,
}

impl MediaSourceManager {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            slots: RwLock::new(Slots::default()),
            hook: RwLock::new(None),
        })
    }

    /// Binds the live-session hook used to keep `activeSourceIds` consistent
    /// when a source is released or lost.
    pub fn bind_session(&self, hook: SessionHandle) {
        *self.hook.write() = Some(hook);
    }

    /// Acquires the camera+microphone handle. Idempotent while held.
    pub async fn acquire_camera(self: &Arc<Self>) -> StudioResult<MediaSourceInfo> {
        self.acquire(SourceKind::Camera).await
    }

    /// Acquires the screen-share handle. Idempotent while held.
    pub async fn acquire_screen(self: &Arc<Self>) -> StudioResult<MediaSourceInfo> {
        self.acquire(SourceKind::Screen).await
    }

    async fn acquire(self: &Arc<Self>, kind: SourceKind) -> StudioResult<MediaSourceInfo> {
        let epoch = {
            let slots = self.slots.read();
            let slot = slots.slot(kind);
            if let Some(source) = &slot.source {
                tracing::debug!(%kind, id = %source.id, "acquire: handle already held");
                return Ok(source.info());
            }
            slot.epoch
        };

        tracing::debug!(%kind, "acquiring device handle");
        // Suspends here, possibly on a permission prompt. On failure the
        // prior state is untouched: nothing was partially acquired.
        let acquired = self.backend.open(kind).await?;

        let (info, ended) = {
            let mut slots = self.slots.write();
            let slot = slots.slot_mut(kind);
            if slot.epoch != epoch {
                // The slot moved on while we were suspended; this late
                // result must not install anything.
                acquired.handle.stop_tracks();
                tracing::debug!(%kind, "acquire: stale completion discarded");
                return Err(StudioError::AcquisitionCancelled { kind });
            }
            if let Some(source) = &slot.source {
                // A concurrent acquire of the same kind won the race.
                acquired.handle.stop_tracks();
                return Ok(source.info());
            }

            let source = HeldSource {
                id: SourceId::new(),
                kind,
                label: acquired.handle.label().to_string(),
                audio_enabled: true,
                video_enabled: true,
                handle: acquired.handle,
            };
            let info = source.info();
            slot.source = Some(source);
            (info, acquired.ended)
        };

        self.spawn_ended_watcher(info.id, kind, ended);
        tracing::info!(%kind, id = %info.id, label = %info.label, "device acquired");
        Ok(info)
    }

    /// Turns the backend's track-ended signal into an explicit source-lost
    /// notification consumed by the recording controller.
    fn spawn_ended_watcher(self: &Arc<Self>, id: SourceId, kind: SourceKind, ended: oneshot::Receiver<()>) {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            if ended.await.is_ok() {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_track_ended(id, kind);
                }
            }
        });
    }

    fn handle_track_ended(&self, id: SourceId, kind: SourceKind) {
        let removed = {
            let mut slots = self.slots.write();
            let slot = slots.slot_mut(kind);
            if slot.source.as_ref().is_some_and(|s| s.id == id) {
                slot.epoch += 1;
                slot.source.take()
            } else {
                None
            }
        };

        if let Some(source) = removed {
            source.handle.stop_tracks();
            tracing::warn!(%kind, %id, "source tracks ended externally");
            if let Some(hook) = self.hook.read().as_ref() {
                hook.notify_source_lost(id);
            }
        }
    }

    /// Releases a held source: synchronously stops all of its tracks and
    /// removes it from the live session's active set.
    pub fn release(&self, id: SourceId) -> StudioResult<()> {
        let removed = {
            let mut slots = self.slots.write();
            match slots.find_mut(id) {
                Some(slot) => {
                    slot.epoch += 1;
                    slot.source.take()
                }
                None => return Err(StudioError::UnknownSource { id }),
            }
        };

        if let Some(source) = removed {
            source.handle.stop_tracks();
            tracing::info!(kind = %source.kind, %id, "source released");
            if let Some(hook) = self.hook.read().as_ref() {
                hook.notify_source_released(id);
            }
        }
        Ok(())
    }

    /// Toggles the audio track of a held source.
    pub fn set_audio_enabled(&self, id: SourceId, enabled: bool) -> StudioResult<()> {
        let mut slots = self.slots.write();
        let slot = slots
            .find_mut(id)
            .ok_or(StudioError::UnknownSource { id })?;
        if let Some(source) = slot.source.as_mut() {
            source.audio_enabled = enabled;
            tracing::debug!(%id, enabled, "audio track toggled");
        }
        Ok(())
    }

    /// Snapshot of every held source.
    pub fn active_sources(&self) -> Vec<MediaSourceInfo> {
        let slots = self.slots.read();
        [&slots.screen, &slots.camera]
            .into_iter()
            .filter_map(|slot| slot.source.as_ref().map(HeldSource::info))
            .collect()
    }

    /// Whether a handle of the given kind is currently held.
    pub fn is_held(&self, kind: SourceKind) -> bool {
        self.slots.read().slot(kind).source.is_some()
    }
}
