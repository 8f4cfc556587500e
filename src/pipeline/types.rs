//! Frame pipeline types

use crate::video_source::ColorSpace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Preprocessing toggles, applied in field order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessOptions {
    pub resize_to: Option<(u32, u32)>,
    pub colorspace: Option<ColorSpace>,
    pub denoise: bool,
    /// Gaussian kernel size, odd
    pub blur_kernel: Option<u32>,
    pub equalize_hist: bool,
}

/// Analytics toggles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsOptions {
    pub basic_stats: bool,
    pub edge_detection: bool,
    pub movement_analysis: bool,
    pub brightness_analysis: bool,
}

impl AnalyticsOptions {
    pub fn any(&self) -> bool {
        self.basic_stats
            || self.edge_detection
            || self.movement_analysis
            || self.brightness_analysis
    }
}

/// Detector construction parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub confidence_threshold: f32,
    /// Keep only these class names (None = all)
    pub classes: Option<Vec<String>>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            classes: None,
        }
    }
}

/// Full per-session pipeline configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub preprocess: PreprocessOptions,
    /// (model key, config)
    pub detection: Option<(String, DetectorConfig)>,
    pub analytics: Option<AnalyticsOptions>,
}

/// One detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// [x1, y1, x2, y2] in frame pixels
    pub bbox: [f32; 4],
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_id: i64,
    pub class_name: String,
}

/// Named analytics values (`red_mean`, `edge_density`, `movement_intensity`, ...)
pub type AnalyticsReport = BTreeMap<String, f64>;

/// Result of running one frame through the pipeline
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    /// None when detection is disabled, unavailable or failed for this frame
    pub detections: Option<Vec<Detection>>,
    /// None when analytics are disabled or produced nothing
    pub analytics: Option<AnalyticsReport>,
    /// Stages that failed on this frame
    pub failed_stages: Vec<&'static str>,
}
