//! Session lifecycle against synthetic sources

use camflow::camera_catalog::{Camera, CameraCatalog, CaptureConfig};
use camflow::event_publisher::TracingEventPublisher;
use camflow::pipeline::DetectorRegistry;
use camflow::realtime_hub::RealtimeHub;
use camflow::stream_session::{SessionConfig, SessionDeps, SessionManager, SessionState};
use camflow::video_source::SourceOpener;
use camflow::worker_pool::WorkerPool;
use camflow::Error;
use std::sync::Arc;
use std::time::Duration;

fn camera(id: &str) -> Camera {
    Camera {
        camera_id: id.to_string(),
        name: format!("Camera {}", id),
        site_id: "plant-7".to_string(),
        url: "synthetic://moving".to_string(),
        location: Some("gate".to_string()),
        configuration: CaptureConfig {
            resolution: "640x480".to_string(),
            frame_rate: 15,
            enable_object_detection: false,
            ..Default::default()
        },
    }
}

fn manager(capacity: usize) -> (SessionManager, Arc<CameraCatalog>, WorkerPool) {
    manager_with(capacity, SessionConfig::default())
}

fn manager_with(
    capacity: usize,
    config: SessionConfig,
) -> (SessionManager, Arc<CameraCatalog>, WorkerPool) {
    let catalog = Arc::new(CameraCatalog::new());
    let pool = WorkerPool::new(capacity);
    let deps = SessionDeps {
        catalog: catalog.clone(),
        pool: pool.clone(),
        opener: SourceOpener::default(),
        detectors: Arc::new(DetectorRegistry::new()),
        hub: Arc::new(RealtimeHub::new()),
        publisher: Arc::new(TracingEventPublisher),
    };
    (SessionManager::new(deps, config), catalog, pool)
}

#[tokio::test]
async fn quick_start_stop_leaves_nothing_running() {
    let (sessions, catalog, pool) = manager(5);
    catalog.upsert(camera("cam-1")).await.unwrap();

    let started = sessions.start("cam-1").await.unwrap();
    assert_eq!(started.status, SessionState::Active);
    assert_eq!(started.configured_frame_rate, Some(15));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let stopped = sessions.stop("cam-1").await.unwrap();
    assert_eq!(stopped.status, SessionState::Stopped);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(sessions.active_count().await, 0);

    let status = serde_json::to_value(sessions.status("cam-1").await.unwrap()).unwrap();
    assert_eq!(status["status"], "inactive");
}

#[tokio::test]
async fn concurrent_starts_produce_one_session() {
    let (sessions, catalog, pool) = manager(5);
    catalog.upsert(camera("cam-2")).await.unwrap();
    let sessions = Arc::new(sessions);

    let a = tokio::spawn({
        let sessions = sessions.clone();
        async move { sessions.start("cam-2").await }
    });
    let b = tokio::spawn({
        let sessions = sessions.clone();
        async move { sessions.start("cam-2").await }
    });
    assert_eq!(a.await.unwrap().unwrap().status, SessionState::Active);
    assert_eq!(b.await.unwrap().unwrap().status, SessionState::Active);

    assert_eq!(sessions.active_count().await, 1);
    assert_eq!(pool.in_use(), 1);

    sessions.shutdown_all().await;
    assert_eq!(pool.in_use(), 0);
}

#[tokio::test]
async fn restart_keeps_a_single_live_session() {
    let (sessions, catalog, pool) = manager(1);
    catalog.upsert(camera("cam-3")).await.unwrap();

    sessions.start("cam-3").await.unwrap();
    let restarted = sessions.restart("cam-3").await.unwrap();
    assert_eq!(restarted.status, SessionState::Active);
    assert_eq!(pool.in_use(), 1);

    sessions.stop("cam-3").await.unwrap();
}

#[tokio::test]
async fn unknown_camera_is_not_found() {
    let (sessions, _catalog, _pool) = manager(5);
    assert!(matches!(sessions.start("missing").await, Err(Error::ResourceNotFound(_))));
    assert!(matches!(sessions.restart("missing").await, Err(Error::ResourceNotFound(_))));
}

#[tokio::test]
async fn stopping_an_idle_camera_is_a_no_op() {
    let (sessions, catalog, _pool) = manager(5);
    catalog.upsert(camera("cam-4")).await.unwrap();

    let status = sessions.stop("cam-4").await.unwrap();
    assert_eq!(status.status, SessionState::Stopped);
    assert!(status.queued_frame_count.is_none());
}

#[tokio::test]
async fn stop_timeout_marks_error_and_frees_slot() {
    let config = SessionConfig {
        stop_grace: Duration::from_millis(200),
        ..Default::default()
    };
    let (sessions, catalog, pool) = manager_with(1, config);
    let mut stuck = camera("cam-5");
    stuck.url = "synthetic://stall".to_string();
    catalog.upsert(stuck).await.unwrap();
    sessions.start("cam-5").await.unwrap();

    let stopped = sessions.stop("cam-5").await.unwrap();
    assert_eq!(stopped.status, SessionState::Error);
    assert!(stopped.last_error.is_some());

    for _ in 0..100 {
        if pool.in_use() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(pool.in_use(), 0);

    catalog.upsert(camera("cam-5")).await.unwrap();
    let restarted = sessions.start("cam-5").await.unwrap();
    assert_eq!(restarted.status, SessionState::Active);
    assert_eq!(sessions.stop("cam-5").await.unwrap().status, SessionState::Stopped);
}
