//! Camera catalog data types

use crate::error::{Error, Result};
use crate::pipeline::{
    AnalyticsOptions, DetectorConfig, ModelKind, PipelineSettings, PreprocessOptions,
};
use crate::video_source::ColorSpace;
use serde::{Deserialize, Serialize};

/// Camera record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(default)]
    pub camera_id: String,
    #[serde(default)]
    pub name: String,
    /// Broadcast channel for this camera's results
    pub site_id: String,
    /// rtsp://, http://, file path or synthetic://
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub configuration: CaptureConfig,
}

impl Camera {
    pub fn validate(&self) -> Result<()> {
        if self.camera_id.trim().is_empty() {
            return Err(Error::Configuration("camera_id must not be empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "camera {} has no source url",
                self.camera_id
            )));
        }
        if self.site_id.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "camera {} has no site id",
                self.camera_id
            )));
        }
        self.configuration.validate()
    }
}

/// Per-camera capture configuration
///
/// Flag names accept both the camelCase API form and the snake_case form
/// stored by older records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// "WxH"
    pub resolution: String,
    pub frame_rate: u32,
    pub enable_object_detection: bool,
    pub enable_analytics: bool,

    // preprocessing
    pub resize: bool,
    pub colorspace: Option<ColorSpace>,
    pub denoise: bool,
    pub blur: bool,
    #[serde(alias = "blur_kernel_size")]
    pub blur_kernel: u32,
    #[serde(alias = "equalize_hist")]
    pub equalize_hist: bool,

    // analytics
    #[serde(alias = "basic_stats")]
    pub basic_stats: bool,
    #[serde(alias = "edge_detection")]
    pub edge_detection: bool,
    #[serde(alias = "movement_analysis")]
    pub movement_analysis: bool,
    #[serde(alias = "brightness_analysis")]
    pub brightness_analysis: bool,

    // detection
    #[serde(alias = "model_type")]
    pub model_type: String,
    #[serde(alias = "confidence_threshold")]
    pub confidence_threshold: f32,
    pub classes: Option<Vec<String>>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: "640x480".to_string(),
            frame_rate: 30,
            enable_object_detection: true,
            enable_analytics: true,
            resize: false,
            colorspace: None,
            denoise: false,
            blur: false,
            blur_kernel: 5,
            equalize_hist: false,
            basic_stats: true,
            edge_detection: false,
            movement_analysis: true,
            brightness_analysis: false,
            model_type: "yolov5".to_string(),
            confidence_threshold: 0.25,
            classes: None,
        }
    }
}

impl CaptureConfig {
    /// Parse "WxH"
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let (w, h) = self
            .resolution
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| {
                Error::Configuration(format!("resolution '{}' is not WxH", self.resolution))
            })?;
        let parse = |s: &str| {
            s.trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    Error::Configuration(format!("resolution '{}' is not WxH", self.resolution))
                })
        };
        Ok((parse(w)?, parse(h)?))
    }

    pub fn validate(&self) -> Result<()> {
        self.dimensions()?;
        if self.frame_rate == 0 {
            return Err(Error::Configuration("frameRate must be positive".to_string()));
        }
        if self.blur && (self.blur_kernel == 0 || self.blur_kernel % 2 == 0) {
            return Err(Error::Configuration(format!(
                "blurKernel must be a positive odd number, got {}",
                self.blur_kernel
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Configuration(format!(
                "confidenceThreshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.enable_object_detection {
            self.model_type.parse::<ModelKind>()?;
        }
        Ok(())
    }

    /// Stage toggles for the frame pipeline
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        let (width, height) = self.dimensions()?;

        let preprocess = PreprocessOptions {
            resize_to: self.resize.then_some((width, height)),
            colorspace: self.colorspace,
            denoise: self.denoise,
            blur_kernel: self.blur.then_some(self.blur_kernel),
            equalize_hist: self.equalize_hist,
        };

        let detection = self.enable_object_detection.then(|| {
            (
                self.model_type.clone(),
                DetectorConfig {
                    confidence_threshold: self.confidence_threshold,
                    classes: self.classes.clone(),
                },
            )
        });

        let analytics = self.enable_analytics.then_some(AnalyticsOptions {
            basic_stats: self.basic_stats,
            edge_detection: self.edge_detection,
            movement_analysis: self.movement_analysis,
            brightness_analysis: self.brightness_analysis,
        });

        Ok(PipelineSettings {
            preprocess,
            detection,
            analytics,
        })
    }
}
