//! Integration tests for the studio session lifecycle.
//!
//! These drive the full control plane with the in-memory device backend and
//! encoder, under tokio's paused clock where timing matters.

use broadcast_studio::{
    DestinationId, LayoutConfig, LayoutId, MediaSourceManager, MemoryArtifactStore,
    MemoryEncoderFactory, MockDeviceBackend, RecordingController, SessionConfig, SessionState,
    SourceKind, StreamDestination, StreamDestinationRegistry, StudioConfig, StudioError,
    StudioEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::advance;

struct Studio {
    controller: RecordingController,
    manager: Arc<MediaSourceManager>,
    backend: Arc<MockDeviceBackend>,
    registry: Arc<StreamDestinationRegistry>,
    store: Arc<MemoryArtifactStore>,
}

fn studio() -> Studio {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let config = StudioConfig::default();
    let backend = MockDeviceBackend::new();
    let manager = MediaSourceManager::new(backend.clone());
    let registry = Arc::new(StreamDestinationRegistry::new());
    let store = MemoryArtifactStore::new();
    let factory = Box::new(MemoryEncoderFactory::new(Duration::from_millis(
        config.chunk_interval_ms,
    )));
    let controller =
        RecordingController::new(manager.clone(), registry.clone(), factory, config)
            .with_store(store.clone());
    Studio {
        controller,
        manager,
        backend,
        registry,
        store,
    }
}

fn drain(rx: &mut broadcast::Receiver<StudioEvent>) -> Vec<StudioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn full_lifecycle_produces_exactly_one_artifact() {
    let mut studio = studio();
    let mut events = studio.controller.subscribe();

    studio.manager.acquire_camera().await.unwrap();
    studio
        .controller
        .start(SessionConfig::record(LayoutConfig::new(LayoutId::Fullscreen)))
        .await
        .unwrap();
    assert_eq!(studio.controller.state(), SessionState::Recording);

    advance(Duration::from_secs(3)).await;
    studio.controller.pause().await.unwrap();
    assert_eq!(studio.controller.state(), SessionState::Paused);

    advance(Duration::from_secs(1)).await;
    studio.controller.resume().await.unwrap();
    assert_eq!(studio.controller.state(), SessionState::Recording);

    advance(Duration::from_secs(2)).await;
    let artifact = studio.controller.stop().await.unwrap().unwrap();
    assert_eq!(studio.controller.state(), SessionState::Idle);

    // Exactly one artifact, handed to the storage collaborator.
    assert_eq!(studio.store.artifacts().len(), 1);
    assert_eq!(studio.store.artifacts()[0].session_id, artifact.session_id);
    assert!(artifact.blob_handle.chunk_count > 0);

    let names: Vec<&str> = drain(&mut events)
        .iter()
        .map(|e| match e {
            StudioEvent::SessionStarted { .. } => "started",
            StudioEvent::SessionPaused { .. } => "paused",
            StudioEvent::SessionResumed { .. } => "resumed",
            StudioEvent::SessionCompleted { .. } => "completed",
            _ => "other",
        })
        .collect::<Vec<_>>();
    assert!(names.contains(&"started"));
    assert!(names.contains(&"paused"));
    assert!(names.contains(&"resumed"));
    assert!(names.contains(&"completed"));
}

#[tokio::test]
async fn stop_while_idle_is_a_no_op() {
    let mut studio = studio();

    let artifact = studio.controller.stop().await.unwrap();
    assert!(artifact.is_none());
    assert_eq!(studio.controller.state(), SessionState::Idle);
    assert!(studio.store.artifacts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duration_excludes_paused_wall_time() {
    let mut studio = studio();
    studio.manager.acquire_camera().await.unwrap();

    studio
        .controller
        .start(SessionConfig::record(LayoutConfig::new(LayoutId::Fullscreen)))
        .await
        .unwrap();

    advance(Duration::from_secs(10)).await;
    studio.controller.pause().await.unwrap();

    // Wall time spent paused must not count.
    advance(Duration::from_secs(7)).await;
    studio.controller.resume().await.unwrap();

    advance(Duration::from_secs(15)).await;
    let artifact = studio.controller.stop().await.unwrap().unwrap();

    assert_eq!(artifact.duration_ms, 25_000);
    assert_eq!(studio.store.artifacts()[0].duration_ms, 25_000);
}

#[tokio::test(start_paused = true)]
async fn stream_mode_fans_out_and_honors_mid_session_toggle() {
    let mut studio = studio();
    studio.manager.acquire_camera().await.unwrap();

    let first: DestinationId = studio
        .registry
        .upsert(StreamDestination::new("main", "rtmps://a.example/live", "sk-a").enabled())
        .unwrap();
    let second: DestinationId = studio
        .registry
        .upsert(StreamDestination::new("backup", "rtmps://b.example/live", "sk-b").enabled())
        .unwrap();

    studio
        .controller
        .start(SessionConfig::stream(LayoutConfig::new(LayoutId::Fullscreen)))
        .await
        .unwrap();

    advance(Duration::from_millis(3_500)).await;
    tokio::task::yield_now().await;

    let counts = studio.controller.fan_out_counts();
    assert_eq!(counts.get(&first), Some(&3));
    assert_eq!(counts.get(&second), Some(&3));

    // Disabling one destination mid-session removes it from subsequent
    // fan-out without stopping the session.
    studio.registry.toggle(second).unwrap();
    assert_eq!(studio.controller.state(), SessionState::Recording);

    advance(Duration::from_millis(2_000)).await;
    tokio::task::yield_now().await;

    let counts = studio.controller.fan_out_counts();
    assert_eq!(counts.get(&first), Some(&5));
    assert_eq!(counts.get(&second), Some(&3));

    // Stream mode still produces the local artifact.
    let artifact = studio.controller.stop().await.unwrap().unwrap();
    assert!(artifact.blob_handle.chunk_count >= 5);
}

#[tokio::test(start_paused = true)]
async fn stopping_drains_chunks_still_queued_for_fan_out() {
    let mut studio = studio();
    studio.manager.acquire_camera().await.unwrap();

    let dest = studio
        .registry
        .upsert(StreamDestination::new("main", "rtmps://a.example/live", "sk-a").enabled())
        .unwrap();

    studio
        .controller
        .start(SessionConfig::stream(LayoutConfig::new(LayoutId::Fullscreen)))
        .await
        .unwrap();

    // Stop right after the last chunk is cut, without yielding first; any
    // chunk still sitting in the channel must reach the fan-out counts.
    advance(Duration::from_millis(3_000)).await;
    tokio::task::yield_now().await;
    let artifact = studio.controller.stop().await.unwrap().unwrap();

    assert_eq!(artifact.blob_handle.chunk_count, 3);
    assert_eq!(studio.controller.fan_out_counts().get(&dest), Some(&3));
}

#[tokio::test(start_paused = true)]
async fn source_lost_mid_recording_degrades_without_stopping() {
    let mut studio = studio();
    let mut events = studio.controller.subscribe();

    let camera = studio.manager.acquire_camera().await.unwrap();
    let screen = studio.manager.acquire_screen().await.unwrap();

    studio
        .controller
        .start(SessionConfig::record(
            LayoutConfig::new(LayoutId::PipBr).with_primary(screen.id),
        ))
        .await
        .unwrap();

    advance(Duration::from_secs(2)).await;

    // Operator revokes screen share in the OS picker.
    studio.backend.trigger_ended(SourceKind::Screen);
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(studio.controller.state(), SessionState::Recording);
    let session = studio.controller.session().unwrap();
    assert_eq!(session.active_source_ids, vec![camera.id]);
    assert!(!studio.manager.is_held(SourceKind::Screen));

    advance(Duration::from_secs(2)).await;
    let artifact = studio.controller.stop().await.unwrap();
    assert!(artifact.is_some());

    let lost: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, StudioEvent::SourceLost { .. }))
        .collect();
    assert_eq!(lost.len(), 1, "exactly one SourceLost per loss event");
}

#[tokio::test(start_paused = true)]
async fn releasing_a_source_removes_it_from_the_live_session() {
    let mut studio = studio();
    let mut events = studio.controller.subscribe();

    let camera = studio.manager.acquire_camera().await.unwrap();
    let screen = studio.manager.acquire_screen().await.unwrap();

    studio
        .controller
        .start(SessionConfig::record(LayoutConfig::new(LayoutId::Split)))
        .await
        .unwrap();

    studio.manager.release(screen.id).unwrap();

    // No dangling id is ever observable.
    let session = studio.controller.session().unwrap();
    assert_eq!(session.active_source_ids, vec![camera.id]);

    // A deliberate release is not a loss.
    let lost = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, StudioEvent::SourceLost { .. }))
        .count();
    assert_eq!(lost, 0);

    advance(Duration::from_secs(1)).await;
    studio.controller.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pausing_never_releases_device_handles() {
    let mut studio = studio();
    studio.manager.acquire_camera().await.unwrap();

    studio
        .controller
        .start(SessionConfig::record(LayoutConfig::new(LayoutId::Fullscreen)))
        .await
        .unwrap();
    advance(Duration::from_secs(1)).await;
    studio.controller.pause().await.unwrap();

    assert!(studio.manager.is_held(SourceKind::Camera));
    assert!(!studio
        .backend
        .device(SourceKind::Camera)
        .unwrap()
        .is_stopped());

    studio.controller.resume().await.unwrap();
    studio.controller.stop().await.unwrap();

    // Handles stay live after stop too, ready for the next take.
    assert!(studio.manager.is_held(SourceKind::Camera));
}

#[tokio::test(start_paused = true)]
async fn device_handles_survive_stop_for_the_next_take() {
    let mut studio = studio();
    let camera = studio.manager.acquire_camera().await.unwrap();

    for _ in 0..2 {
        studio
            .controller
            .start(SessionConfig::record(LayoutConfig::new(LayoutId::Fullscreen)))
            .await
            .unwrap();
        advance(Duration::from_secs(1)).await;
        studio.controller.stop().await.unwrap().unwrap();
    }

    assert_eq!(studio.store.artifacts().len(), 2);
    let next = studio.manager.acquire_camera().await.unwrap();
    assert_eq!(next.id, camera.id, "second take reuses the held handle");
}

#[tokio::test]
async fn invalid_operations_surface_typed_errors() {
    let mut studio = studio();

    assert!(matches!(
        studio.controller.resume().await.unwrap_err(),
        StudioError::InvalidSessionState {
            operation: "resume",
            ..
        }
    ));
    assert!(matches!(
        studio.controller.reset().unwrap_err(),
        StudioError::InvalidSessionState {
            operation: "reset",
            ..
        }
    ));
}
