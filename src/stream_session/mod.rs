//! SessionManager - per-camera capture/processing lifecycle
//!
//! ## Responsibilities
//!
//! - start / stop / restart / status per camera id
//! - At most one live session per camera; operations on one camera are serialized
//! - Worker pool admission, cancellation, bounded stop grace period
//!
//! ## Design
//!
//! - Each session owns a bounded queue, a stop signal and two named threads
//! - The pool slot is returned when the last worker of a session exits
//! - A session whose workers do not exit in time is force-released and kept
//!   in Error state so status can report it

mod signal;
mod types;
mod workers;

pub use signal::StopSignal;
pub use types::{SessionState, SessionStatus};

use crate::camera_catalog::{Camera, CameraCatalog};
use crate::error::{Error, Result};
use crate::event_publisher::EventPublisher;
use crate::frame_queue::BoundedFrameQueue;
use crate::pipeline::DetectorRegistry;
use crate::realtime_hub::RealtimeHub;
use crate::video_source::{Frame, SourceOpener, SourceSpec};
use crate::worker_pool::WorkerPool;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use types::SessionShared;
use workers::{CaptureWorker, ProcessingWorker};

/// Timing and sizing knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    pub stop_grace: Duration,
    pub capture_retry: Duration,
    pub process_poll: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: crate::frame_queue::DEFAULT_CAPACITY,
            stop_grace: Duration::from_millis(2000),
            capture_retry: Duration::from_millis(1000),
            process_poll: Duration::from_millis(10),
        }
    }
}

/// Collaborators injected into the manager
pub struct SessionDeps {
    pub catalog: Arc<CameraCatalog>,
    pub pool: WorkerPool,
    pub opener: SourceOpener,
    pub detectors: Arc<DetectorRegistry>,
    pub hub: Arc<RealtimeHub>,
    pub publisher: Arc<dyn EventPublisher>,
}

struct StreamSession {
    queue: Arc<BoundedFrameQueue<Frame>>,
    stop: StopSignal,
    shared: Arc<SessionShared>,
    capture: Option<JoinHandle<()>>,
    processing: Option<JoinHandle<()>>,
    frame_rate: u32,
    started_at: DateTime<Utc>,
}

impl StreamSession {
    fn workers_finished(&self) -> bool {
        let done = |h: &Option<JoinHandle<()>>| h.as_ref().map(|h| h.is_finished()).unwrap_or(true);
        done(&self.capture) && done(&self.processing)
    }

    fn join_workers(&mut self) {
        for handle in [self.capture.take(), self.processing.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::error!("Session worker panicked");
            }
        }
    }

    fn status(&self, camera_id: &str) -> SessionStatus {
        let state = self.shared.state();
        let running = !matches!(state, SessionState::Stopped);
        SessionStatus {
            camera_id: camera_id.to_string(),
            status: state,
            queued_frame_count: running.then(|| self.queue.len()),
            configured_frame_rate: running.then_some(self.frame_rate),
            frames_captured: Some(self.shared.frames_captured.load(Ordering::Relaxed)),
            frames_processed: Some(self.shared.frames_processed.load(Ordering::Relaxed)),
            frames_dropped: Some(self.queue.dropped_count()),
            last_error: self.shared.last_error(),
        }
    }
}

/// Stream session manager
pub struct SessionManager {
    deps: SessionDeps,
    config: SessionConfig,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    sessions: RwLock<HashMap<String, StreamSession>>,
}

impl SessionManager {
    pub fn new(deps: SessionDeps, config: SessionConfig) -> Self {
        Self {
            deps,
            config,
            locks: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Per-camera operation lock (created on demand)
    async fn camera_lock(&self, camera_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(camera_id) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;
        locks
            .entry(camera_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start streaming. Idempotent while Starting/Active.
    pub async fn start(&self, camera_id: &str) -> Result<SessionStatus> {
        let lock = self.camera_lock(camera_id).await;
        let _guard = lock.lock().await;
        self.start_locked(camera_id).await
    }

    /// Stop streaming. Stopping an inactive known camera is a no-op.
    pub async fn stop(&self, camera_id: &str) -> Result<SessionStatus> {
        let lock = self.camera_lock(camera_id).await;
        let _guard = lock.lock().await;

        match self.stop_locked(camera_id).await {
            Some(status) => Ok(status),
            None => self.inactive_or_missing(camera_id).await,
        }
    }

    /// stop + start under one lock
    pub async fn restart(&self, camera_id: &str) -> Result<SessionStatus> {
        let lock = self.camera_lock(camera_id).await;
        let _guard = lock.lock().await;

        if let Some(status) = self.stop_locked(camera_id).await {
            if status.status == SessionState::Error {
                tracing::warn!(camera_id = %camera_id, "Previous session did not stop cleanly");
            }
        }
        self.start_locked(camera_id).await
    }

    pub async fn status(&self, camera_id: &str) -> Result<SessionStatus> {
        if let Some(session) = self.sessions.read().await.get(camera_id) {
            return Ok(session.status(camera_id));
        }
        self.inactive_or_missing(camera_id).await
    }

    /// Status of every tracked session
    pub async fn list(&self) -> Vec<SessionStatus> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<SessionStatus> = sessions
            .iter()
            .map(|(id, session)| session.status(id))
            .collect();
        all.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        all
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.shared.state().is_live())
            .count()
    }

    /// Camera record changed: restart a live session so it picks up the new config
    pub async fn on_camera_updated(&self, camera_id: &str) -> Result<Option<SessionStatus>> {
        let live = match self.sessions.read().await.get(camera_id) {
            Some(session) => session.shared.state().is_live(),
            None => false,
        };
        if !live {
            return Ok(None);
        }
        tracing::info!(camera_id = %camera_id, "Camera updated, restarting session");
        self.restart(camera_id).await.map(Some)
    }

    /// Camera record removed: stop and forget the session
    pub async fn on_camera_deleted(&self, camera_id: &str) {
        let lock = self.camera_lock(camera_id).await;
        {
            let _guard = lock.lock().await;
            if let Some(status) = self.stop_locked(camera_id).await {
                if status.status == SessionState::Error {
                    // workers are detached; nothing left to report on a deleted camera
                    self.sessions.write().await.remove(camera_id);
                }
            }
        }
        self.locks.write().await.remove(camera_id);
    }

    /// Stop every session (process shutdown)
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        tracing::info!(count = ids.len(), "Stopping all sessions");
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                tracing::warn!(camera_id = %id, error = %e, "Failed to stop session");
            }
        }
    }

    async fn inactive_or_missing(&self, camera_id: &str) -> Result<SessionStatus> {
        match self.deps.catalog.get(camera_id).await {
            Some(_) => Ok(SessionStatus::inactive(camera_id)),
            None => Err(Error::ResourceNotFound(format!("camera {}", camera_id))),
        }
    }

    async fn start_locked(&self, camera_id: &str) -> Result<SessionStatus> {
        let camera = self
            .deps
            .catalog
            .get(camera_id)
            .await
            .ok_or_else(|| Error::ResourceNotFound(format!("camera {}", camera_id)))?;

        {
            let mut sessions = self.sessions.write().await;
            if let Some(existing) = sessions.get(camera_id) {
                let state = existing.shared.state();
                if state.is_live() {
                    tracing::debug!(
                        camera_id = %camera_id,
                        state = ?state,
                        "Session already running"
                    );
                    return Ok(existing.status(camera_id));
                }
                // leftover Error session: its workers were cancelled already
                if let Some(mut stale) = sessions.remove(camera_id) {
                    stale.stop.cancel();
                    if stale.workers_finished() {
                        stale.join_workers();
                    }
                }
            }
        }

        let session = self.spawn_session(&camera)?;
        session.shared.transition(SessionState::Starting, SessionState::Active);
        let status = session.status(camera_id);

        tracing::info!(
            camera_id = %camera_id,
            site_id = %camera.site_id,
            frame_rate = session.frame_rate,
            state = ?status.status,
            "Session started"
        );

        self.sessions
            .write()
            .await
            .insert(camera_id.to_string(), session);
        Ok(status)
    }

    fn spawn_session(&self, camera: &Camera) -> Result<StreamSession> {
        let config = &camera.configuration;
        let (width, height) = config.dimensions()?;
        let settings = config.pipeline_settings()?;
        let lease = self.deps.pool.try_acquire(&camera.camera_id)?;

        let queue = Arc::new(BoundedFrameQueue::new(self.config.queue_capacity));
        let stop = StopSignal::new();
        let shared = Arc::new(SessionShared::new(lease, 2));

        let capture = CaptureWorker {
            camera_id: camera.camera_id.clone(),
            spec: SourceSpec {
                uri: camera.url.clone(),
                width,
                height,
                frame_rate: config.frame_rate,
            },
            opener: self.deps.opener.clone(),
            queue: queue.clone(),
            stop: stop.clone(),
            shared: shared.clone(),
            retry_backoff: self.config.capture_retry,
        };
        let processing = ProcessingWorker {
            camera_id: camera.camera_id.clone(),
            site_id: camera.site_id.clone(),
            settings,
            detectors: self.deps.detectors.clone(),
            queue: queue.clone(),
            stop: stop.clone(),
            shared: shared.clone(),
            hub: self.deps.hub.clone(),
            publisher: self.deps.publisher.clone(),
            poll_interval: self.config.process_poll,
        };

        let capture_handle = std::thread::Builder::new()
            .name(format!("capture-{}", camera.camera_id))
            .spawn(move || capture.run());
        let capture_handle = match capture_handle {
            Ok(handle) => handle,
            Err(e) => {
                // neither worker runs: return the slot now
                shared.worker_exited();
                shared.worker_exited();
                return Err(e.into());
            }
        };

        let processing_handle = std::thread::Builder::new()
            .name(format!("process-{}", camera.camera_id))
            .spawn(move || processing.run());
        let processing_handle = match processing_handle {
            Ok(handle) => handle,
            Err(e) => {
                stop.cancel();
                shared.worker_exited();
                let _ = capture_handle.join();
                return Err(e.into());
            }
        };

        Ok(StreamSession {
            queue,
            stop,
            shared,
            capture: Some(capture_handle),
            processing: Some(processing_handle),
            frame_rate: config.frame_rate,
            started_at: Utc::now(),
        })
    }

    /// None when there was no session. The session stays in the map while
    /// its workers drain so `status` reports Stopping.
    async fn stop_locked(&self, camera_id: &str) -> Option<SessionStatus> {
        {
            let sessions = self.sessions.read().await;
            let session = sessions.get(camera_id)?;
            if session.shared.state() != SessionState::Error {
                session.shared.set_state(SessionState::Stopping);
            }
            session.stop.cancel();
        }

        let deadline = Instant::now() + self.config.stop_grace;
        let finished = loop {
            let finished = self
                .sessions
                .read()
                .await
                .get(camera_id)
                .map(|s| s.workers_finished())
                .unwrap_or(true);
            if finished || Instant::now() >= deadline {
                break finished;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        if finished {
            let mut session = self.sessions.write().await.remove(camera_id)?;
            session.join_workers();
            session.shared.set_state(SessionState::Stopped);
            tracing::info!(
                camera_id = %camera_id,
                uptime_sec = (Utc::now() - session.started_at).num_seconds(),
                "Session stopped"
            );
            return Some(SessionStatus::inactive(camera_id));
        }

        let sessions = self.sessions.read().await;
        let session = sessions.get(camera_id)?;
        let released = session.shared.force_release();
        session.shared.fail(format!(
            "workers did not exit within {} ms",
            self.config.stop_grace.as_millis()
        ));
        tracing::error!(
            camera_id = %camera_id,
            source_released = released,
            "Session workers did not stop in time"
        );
        Some(session.status(camera_id))
    }
}
