//! Application state
//!
//! Holds all shared components and configuration

use crate::camera_catalog::CameraCatalog;
use crate::pipeline::DetectorRegistry;
use crate::realtime_hub::RealtimeHub;
use crate::stream_session::{SessionConfig, SessionManager};
use crate::worker_pool::WorkerPool;
use crate::workflow::WorkflowEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Camera catalog JSON file (optional)
    pub cameras_file: Option<PathBuf>,
    /// Frames buffered between capture and processing per session
    pub frame_queue_capacity: usize,
    /// Concurrent stream sessions
    pub max_active_sessions: usize,
    pub stop_grace_ms: u64,
    pub capture_retry_ms: u64,
    pub process_poll_ms: u64,
    /// Deadline for a workflow execute request
    pub workflow_timeout_sec: u64,
    /// Remote inference server for yolov5 (optional)
    pub inference_url: Option<String>,
    /// Event broker for detection/analytics topics (optional)
    pub event_broker_url: Option<String>,
    /// ffmpeg binary used for RTSP/file capture
    pub ffmpeg_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080),
            cameras_file: std::env::var("CAMERAS_FILE").ok().map(PathBuf::from),
            frame_queue_capacity: env_or(
                "FRAME_QUEUE_CAPACITY",
                crate::frame_queue::DEFAULT_CAPACITY,
            ),
            max_active_sessions: env_or("MAX_ACTIVE_SESSIONS", 5),
            stop_grace_ms: env_or("STOP_GRACE_MS", 2000),
            capture_retry_ms: env_or("CAPTURE_RETRY_MS", 1000),
            process_poll_ms: env_or("PROCESS_POLL_MS", 10),
            workflow_timeout_sec: env_or("WORKFLOW_TIMEOUT_SEC", 30),
            inference_url: std::env::var("INFERENCE_URL").ok().filter(|v| !v.is_empty()),
            event_broker_url: std::env::var("EVENT_BROKER_URL").ok().filter(|v| !v.is_empty()),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
        }
    }
}

impl AppConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            queue_capacity: self.frame_queue_capacity.max(1),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            capture_retry: Duration::from_millis(self.capture_retry_ms),
            process_poll: Duration::from_millis(self.process_poll_ms.max(1)),
        }
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout_sec)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<CameraCatalog>,
    pub pool: WorkerPool,
    pub detectors: Arc<DetectorRegistry>,
    pub realtime: Arc<RealtimeHub>,
    pub sessions: Arc<SessionManager>,
    pub workflows: Arc<WorkflowEngine>,
    pub started_at: std::time::Instant,
}
