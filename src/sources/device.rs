//! Device backend seam and mock implementation
//!
//! Platform capture backends implement [`DeviceBackend`]. The in-tree
//! [`MockDeviceBackend`] is used by tests and by the studio preview when no
//! real capture layer is linked in.

use crate::error::{StudioError, StudioResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Kind of media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Camera,
    Screen,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::Screen => write!(f, "screen"),
        }
    }
}

/// Unique identifier of an acquired media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle to a live capture device.
///
/// Exclusively owned by the [`MediaSourceManager`](crate::sources::MediaSourceManager);
/// nothing else may stop or keep tracks alive.
pub trait DeviceHandle: Send + Sync {
    /// Human-readable device label
    fn label(&self) -> &str;

    /// Synchronously stops every track backed by this handle.
    fn stop_tracks(&self);
}

/// A successfully opened device plus its external-cancellation signal
pub struct AcquiredDevice {
    pub handle: Box<dyn DeviceHandle>,
    /// Fires when the tracks end outside our control (for example the
    /// operator revokes screen share in the OS picker). Asynchronous
    /// external cancellation, not an error.
    pub ended: oneshot::Receiver<()>,
}

/// Platform seam for opening capture devices.
///
/// Acquisition may suspend on a permission prompt; implementations must not
/// hold locks across that wait.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    async fn open(&self, kind: SourceKind) -> StudioResult<AcquiredDevice>;
}

/// Mock device handle with inspectable track state
#[derive(Clone)]
pub struct MockDevice {
    inner: Arc<MockDeviceInner>,
}

struct MockDeviceInner {
    label: String,
    stopped: AtomicBool,
    ended_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl MockDevice {
    fn new(label: String, ended_tx: oneshot::Sender<()>) -> Self {
        Self {
            inner: Arc::new(MockDeviceInner {
                label,
                stopped: AtomicBool::new(false),
                ended_tx: Mutex::new(Some(ended_tx)),
            }),
        }
    }

    /// Whether `stop_tracks` has been called on this handle.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Simulates the tracks ending outside the studio's control.
    pub fn trigger_ended(&self) {
        if let Some(tx) = self.inner.ended_tx.lock().take() {
            let _ = tx.send(());
        }
    }
}

impl DeviceHandle for MockDevice {
    fn label(&self) -> &str {
        &self.inner.label
    }

    fn stop_tracks(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }
}

/// Scriptable [`DeviceBackend`] for tests and headless preview
#[derive(Default)]
pub struct MockDeviceBackend {
    fail_next: Mutex<HashMap<SourceKind, VecDeque<StudioError>>>,
    delays: Mutex<HashMap<SourceKind, VecDeque<Duration>>>,
    devices: Mutex<Vec<(SourceKind, MockDevice)>>,
}

impl MockDeviceBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues an error for the next `open` of the given kind.
    pub fn fail_next(&self, kind: SourceKind, error: StudioError) {
        self.fail_next.lock().entry(kind).or_default().push_back(error);
    }

    /// Queues an acquisition delay (a stand-in for a permission prompt).
    pub fn delay_next(&self, kind: SourceKind, delay: Duration) {
        self.delays.lock().entry(kind).or_default().push_back(delay);
    }

    /// Most recently opened device of the given kind.
    pub fn device(&self, kind: SourceKind) -> Option<MockDevice> {
        self.devices
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, d)| d.clone())
    }

    /// Ends the tracks of the most recently opened device of the given kind.
    pub fn trigger_ended(&self, kind: SourceKind) {
        if let Some(device) = self.device(kind) {
            device.trigger_ended();
        }
    }
}

#[async_trait]
impl DeviceBackend for MockDeviceBackend {
    async fn open(&self, kind: SourceKind) -> StudioResult<AcquiredDevice> {
        let delay = self
            .delays
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .fail_next
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        let (ended_tx, ended) = oneshot::channel();
        let device = MockDevice::new(format!("mock {kind}"), ended_tx);
        self.devices.lock().push((kind, device.clone()));

        Ok(AcquiredDevice {
            handle: Box::new(device),
            ended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_backend_opens_and_scripts_failures() {
        let backend = MockDeviceBackend::new();
        backend.fail_next(
            SourceKind::Camera,
            StudioError::DeviceInUse {
                kind: SourceKind::Camera,
            },
        );

        let opened = backend.open(SourceKind::Camera).await;
        assert!(matches!(opened, Err(StudioError::DeviceInUse { .. })));

        let acquired = backend.open(SourceKind::Camera).await.unwrap();
        assert_eq!(acquired.handle.label(), "mock camera");
    }

    #[tokio::test]
    async fn trigger_ended_fires_the_signal_once() {
        let backend = MockDeviceBackend::new();
        let acquired = backend.open(SourceKind::Screen).await.unwrap();

        backend.trigger_ended(SourceKind::Screen);
        acquired.ended.await.unwrap();
    }

    #[tokio::test]
    async fn stop_tracks_is_observable() {
        let backend = MockDeviceBackend::new();
        let acquired = backend.open(SourceKind::Camera).await.unwrap();

        acquired.handle.stop_tracks();
        assert!(backend.device(SourceKind::Camera).unwrap().is_stopped());
    }
}
