//! Stream session types

use crate::worker_pool::WorkerLease;
use crate::video_source::SourceRelease;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[serde(rename = "inactive")]
    Stopped,
    Starting,
    Active,
    Stopping,
    Error,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Starting,
            2 => SessionState::Active,
            3 => SessionState::Stopping,
            4 => SessionState::Error,
            _ => SessionState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Stopped => 0,
            SessionState::Starting => 1,
            SessionState::Active => 2,
            SessionState::Stopping => 3,
            SessionState::Error => 4,
        }
    }

    /// Starting or Active
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Active)
    }
}

/// Status snapshot returned by the session manager
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub camera_id: String,
    pub status: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_frame_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured_frame_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_captured: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_dropped: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SessionStatus {
    pub fn inactive(camera_id: &str) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            status: SessionState::Stopped,
            queued_frame_count: None,
            configured_frame_rate: None,
            frames_captured: None,
            frames_processed: None,
            frames_dropped: None,
            last_error: None,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// State shared between the manager and a session's workers
pub(crate) struct SessionShared {
    state: AtomicU8,
    last_error: Mutex<Option<String>>,
    release: Mutex<Option<Arc<dyn SourceRelease>>>,
    lease: Mutex<Option<WorkerLease>>,
    running_workers: AtomicUsize,
    pub(crate) frames_captured: AtomicU64,
    pub(crate) frames_processed: AtomicU64,
}

impl SessionShared {
    pub(crate) fn new(lease: WorkerLease, workers: usize) -> Self {
        Self {
            state: AtomicU8::new(SessionState::Starting.as_u8()),
            last_error: Mutex::new(None),
            release: Mutex::new(None),
            lease: Mutex::new(Some(lease)),
            running_workers: AtomicUsize::new(workers),
            frames_captured: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Move `from` -> `to` only if still in `from`
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn fail(&self, message: impl Into<String>) {
        *lock(&self.last_error) = Some(message.into());
        self.set_state(SessionState::Error);
    }

    /// Record an error without leaving the current state
    pub(crate) fn note_error(&self, message: impl Into<String>) {
        *lock(&self.last_error) = Some(message.into());
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub(crate) fn set_release(&self, handle: Arc<dyn SourceRelease>) {
        *lock(&self.release) = Some(handle);
    }

    /// Force-release the capture device if it is still open
    pub(crate) fn force_release(&self) -> bool {
        match lock(&self.release).take() {
            Some(handle) => {
                handle.force_release();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_release(&self) {
        lock(&self.release).take();
    }

    /// Called once by each worker on exit; the last one returns the pool slot
    pub(crate) fn worker_exited(&self) {
        if self.running_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
            lock(&self.lease).take();
        }
    }
}

/// Decrements the worker count when the worker thread ends, panics included
pub(crate) struct WorkerExit(pub(crate) Arc<SessionShared>);

impl Drop for WorkerExit {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}
