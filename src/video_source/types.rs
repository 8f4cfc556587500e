//! Frame and source error types

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Pixel interpretation of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Rgb,
    #[serde(alias = "gray")]
    Grayscale,
    Hsv,
}

/// A captured frame. Lives only in the queue and the processing iteration.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub color: ColorSpace,
    pub captured_at: DateTime<Utc>,
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: DynamicImage, sequence: u64) -> Self {
        let color = match image {
            DynamicImage::ImageLuma8(_) => ColorSpace::Grayscale,
            _ => ColorSpace::Rgb,
        };
        Self {
            image,
            color,
            captured_at: Utc::now(),
            sequence,
        }
    }

    /// Same metadata, new pixels
    pub fn with_image(&self, image: DynamicImage, color: ColorSpace) -> Self {
        Self {
            image,
            color,
            captured_at: self.captured_at,
            sequence: self.sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Where and how to open a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// Capture source errors. All of them are retried by the capture worker.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open video source {uri}: {reason}")]
    Open { uri: String, reason: String },

    #[error("failed to read frame: {0}")]
    Read(String),

    #[error("source has been released")]
    Released,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<SourceError> for crate::error::Error {
    fn from(err: SourceError) -> Self {
        crate::error::Error::TransientSource(err.to_string())
    }
}
