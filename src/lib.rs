//! camflow - live camera ingestion and workflow execution
//!
//! ## Architecture
//!
//! 1. CameraCatalog - camera records and capture settings
//! 2. VideoSource - frame acquisition (ffmpeg / synthetic)
//! 3. FrameQueue - bounded drop-newest buffer between workers
//! 4. WorkerPool - admission for concurrent sessions
//! 5. Pipeline - preprocessing, detection, analytics per frame
//! 6. EventPublisher - detections/analytics topics
//! 7. RealtimeHub - per-channel WebSocket fan-out
//! 8. StreamSession - per-camera capture/processing lifecycle
//! 9. Workflow - DAG validation, compilation and execution
//! 10. WebAPI - REST and WebSocket endpoints

pub mod camera_catalog;
pub mod error;
pub mod event_publisher;
pub mod frame_queue;
pub mod models;
pub mod pipeline;
pub mod realtime_hub;
pub mod state;
pub mod stream_session;
pub mod video_source;
pub mod web_api;
pub mod worker_pool;
pub mod workflow;

pub use error::{Error, Result};
pub use state::AppState;
