//! Detector registry and the remote inference detector
//!
//! Model keys resolve through `ModelKind`. Every kind has an entry in the
//! registry: either a factory or `NotImplemented`.

use super::types::{Detection, DetectorConfig};
use crate::error::{Error, Result};
use crate::video_source::Frame;
use image::ImageFormat;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Object detector. Instantiated once per session, used from the processing thread.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Known model keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Yolov5,
    PoseDetection,
    FaceDetection,
    ActivityRecognition,
    AttentionAnalysis,
    VehicleAnalysis,
    PpeDetection,
    AnomalyDetection,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::Yolov5,
        ModelKind::PoseDetection,
        ModelKind::FaceDetection,
        ModelKind::ActivityRecognition,
        ModelKind::AttentionAnalysis,
        ModelKind::VehicleAnalysis,
        ModelKind::PpeDetection,
        ModelKind::AnomalyDetection,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::Yolov5 => "yolov5",
            ModelKind::PoseDetection => "poseDetection",
            ModelKind::FaceDetection => "faceDetection",
            ModelKind::ActivityRecognition => "activityRecognition",
            ModelKind::AttentionAnalysis => "attentionAnalysisModel",
            ModelKind::VehicleAnalysis => "vehicleAnalysis",
            ModelKind::PpeDetection => "ppeDetection",
            ModelKind::AnomalyDetection => "anomalyDetection",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| Error::UnknownModelType(s.to_string()))
    }
}

/// Builds a detector for a session
pub type DetectorFactory = Arc<dyn Fn(&DetectorConfig) -> Result<Box<dyn Detector>> + Send + Sync>;

#[derive(Clone)]
enum Provider {
    Factory(DetectorFactory),
    NotImplemented,
}

/// ModelKind -> provider table
#[derive(Clone)]
pub struct DetectorRegistry {
    providers: HashMap<ModelKind, Provider>,
}

impl DetectorRegistry {
    /// Every kind registered as NotImplemented
    pub fn new() -> Self {
        let providers = ModelKind::ALL
            .iter()
            .map(|kind| (*kind, Provider::NotImplemented))
            .collect();
        Self { providers }
    }

    /// yolov5 served by a remote inference endpoint
    pub fn with_remote_inference(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let mut registry = Self::new();
        registry.register(
            ModelKind::Yolov5,
            Arc::new(move |config: &DetectorConfig| {
                let detector = RemoteDetector::new(&base_url, ModelKind::Yolov5, config.clone())?;
                Ok(Box::new(detector) as Box<dyn Detector>)
            }),
        );
        registry
    }

    pub fn register(&mut self, kind: ModelKind, factory: DetectorFactory) {
        self.providers.insert(kind, Provider::Factory(factory));
    }

    /// Startup check: every kind has an entry. Returns the kinds that can be instantiated.
    pub fn validate(&self) -> Result<Vec<ModelKind>> {
        let mut available = Vec::new();
        for kind in ModelKind::ALL {
            match self.providers.get(&kind) {
                Some(Provider::Factory(_)) => available.push(kind),
                Some(Provider::NotImplemented) => {
                    tracing::debug!(model = %kind, "Detector not provided");
                }
                None => {
                    return Err(Error::Configuration(format!(
                        "detector registry has no entry for {}",
                        kind
                    )))
                }
            }
        }
        Ok(available)
    }

    /// Resolve a model key and build a detector
    pub fn instantiate(&self, key: &str, config: &DetectorConfig) -> Result<Box<dyn Detector>> {
        let kind = ModelKind::from_str(key)?;
        match self.providers.get(&kind) {
            Some(Provider::Factory(factory)) => factory(config),
            Some(Provider::NotImplemented) | None => Err(Error::NotImplemented(format!(
                "no detector provider for model {}",
                kind
            ))),
        }
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep detections above the threshold and in the allowed classes
pub fn filter_detections(detections: Vec<Detection>, config: &DetectorConfig) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= config.confidence_threshold)
        .filter(|d| match &config.classes {
            Some(classes) => classes.iter().any(|c| c == &d.class_name),
            None => true,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Inference server client: JPEG in, detections out
pub struct RemoteDetector {
    client: reqwest::blocking::Client,
    url: String,
    model: ModelKind,
    config: DetectorConfig,
}

impl RemoteDetector {
    pub fn new(base_url: &str, model: ModelKind, config: DetectorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/v1/detect", base_url.trim_end_matches('/')),
            model,
            config,
        })
    }

    fn encode(frame: &Frame) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        frame
            .image
            .write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(|e| Error::stage("detection", format!("jpeg encode: {}", e)))?;
        Ok(buf.into_inner())
    }
}

impl Detector for RemoteDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let jpeg = Self::encode(frame)?;

        let mut form = Form::new()
            .part(
                "image",
                Part::bytes(jpeg)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("model", self.model.key())
            .text("confidence", self.config.confidence_threshold.to_string());
        if let Some(classes) = &self.config.classes {
            form = form.text("classes", classes.join(","));
        }

        let resp = self.client.post(&self.url).multipart(form).send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(Error::stage(
                "detection",
                format!("inference failed: {} - {}", status, body),
            ));
        }

        let parsed: DetectResponse = resp.json()?;
        Ok(filter_detections(parsed.detections, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_name: &str, confidence: f32) -> Detection {
        Detection {
            bbox: [0.0, 0.0, 10.0, 10.0],
            confidence,
            class_id: 0,
            class_name: class_name.to_string(),
        }
    }

    #[test]
    fn test_model_keys_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.key().parse::<ModelKind>().unwrap(), kind);
        }
        assert!(matches!(
            "yolov9".parse::<ModelKind>(),
            Err(Error::UnknownModelType(_))
        ));
    }

    #[test]
    fn test_registry_validate_and_not_implemented() {
        let registry = DetectorRegistry::with_remote_inference("http://127.0.0.1:9");
        assert_eq!(registry.validate().unwrap(), vec![ModelKind::Yolov5]);

        let err = registry
            .instantiate("faceDetection", &DetectorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::NotImplemented(_)));

        let err = registry
            .instantiate("nope", &DetectorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownModelType(_)));
    }

    #[test]
    fn test_filter_detections() {
        let config = DetectorConfig {
            confidence_threshold: 0.5,
            classes: Some(vec!["person".to_string()]),
        };
        let kept = filter_detections(
            vec![det("person", 0.9), det("person", 0.3), det("car", 0.95)],
            &config,
        );
        assert_eq!(kept, vec![det("person", 0.9)]);
    }
}
