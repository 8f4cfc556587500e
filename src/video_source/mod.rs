//! Video sources for the capture worker
//!
//! ## Responsibilities
//!
//! - `VideoSource` contract: read one frame, release, force-release from another thread
//! - URI dispatch (`synthetic://` test patterns, everything else through ffmpeg)
//! - `SourceGuard` releases the source on every exit path of the capture loop

mod ffmpeg;
mod synthetic;
mod types;

pub use ffmpeg::FfmpegSource;
pub use synthetic::SyntheticSource;
pub use types::*;

use std::sync::Arc;

/// Releases the underlying device from any thread, unblocking a pending read
pub trait SourceRelease: Send + Sync {
    fn force_release(&self);
}

/// A pull-based frame source
pub trait VideoSource: Send {
    /// Blocks until the next frame is available
    fn read_frame(&mut self) -> Result<Frame, SourceError>;

    /// Handle the session manager keeps to reclaim the device after a stuck stop
    fn release_handle(&self) -> Arc<dyn SourceRelease>;

    /// Close the device. Idempotent.
    fn release(&mut self);
}

/// Opens sources by URI
#[derive(Debug, Clone)]
pub struct SourceOpener {
    ffmpeg_path: String,
}

impl SourceOpener {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn open(&self, spec: &SourceSpec) -> Result<Box<dyn VideoSource>, SourceError> {
        if let Some(pattern) = spec.uri.strip_prefix(synthetic::SCHEME) {
            let source = SyntheticSource::open(pattern, spec)?;
            return Ok(Box::new(source));
        }

        let source = FfmpegSource::open(&self.ffmpeg_path, spec)?;
        Ok(Box::new(source))
    }
}

impl Default for SourceOpener {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Owns an open source and releases it when dropped
pub struct SourceGuard {
    source: Box<dyn VideoSource>,
}

impl SourceGuard {
    pub fn new(source: Box<dyn VideoSource>) -> Self {
        Self { source }
    }

    pub fn read_frame(&mut self) -> Result<Frame, SourceError> {
        self.source.read_frame()
    }

    pub fn release_handle(&self) -> Arc<dyn SourceRelease> {
        self.source.release_handle()
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.source.release();
    }
}
