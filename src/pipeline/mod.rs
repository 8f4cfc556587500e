//! FramePipeline - per-session frame processing
//!
//! ## Responsibilities
//!
//! - Fixed order: preprocessing -> detection -> analytics
//! - Stage isolation: a failing stage is logged and skipped, the frame continues
//! - Session state: lazily built detector, previous frame for movement analysis

mod analytics;
mod detection;
mod preprocess;
mod types;

pub use detection::{
    filter_detections, Detector, DetectorFactory, DetectorRegistry, ModelKind, RemoteDetector,
};
pub use types::*;

use crate::error::{Error, Result};
use crate::video_source::Frame;
use analytics::MovementState;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

enum DetectorSlot {
    Unresolved,
    Ready(Box<dyn Detector>),
    /// Build failed; the error text is kept for session status
    Unavailable(String),
}

/// Stage chain for one stream session
pub struct FramePipeline {
    settings: PipelineSettings,
    registry: Arc<DetectorRegistry>,
    detector: DetectorSlot,
    movement: MovementState,
}

/// Apply one preprocessing step, keeping the input frame on failure
fn apply_step(
    stage: &'static str,
    frame: Frame,
    failed: &mut Vec<&'static str>,
    step: impl FnOnce(&Frame) -> Result<Frame>,
) -> Frame {
    match step(&frame) {
        Ok(next) => next,
        Err(e) => {
            tracing::warn!(
                stage = stage,
                sequence = frame.sequence,
                error = %e,
                "Preprocessing stage failed"
            );
            failed.push(stage);
            frame
        }
    }
}

impl FramePipeline {
    pub fn new(settings: PipelineSettings, registry: Arc<DetectorRegistry>) -> Self {
        Self {
            settings,
            registry,
            detector: DetectorSlot::Unresolved,
            movement: MovementState::default(),
        }
    }

    /// Why detection is off for this session, once the build has failed
    pub fn detector_error(&self) -> Option<&str> {
        match &self.detector {
            DetectorSlot::Unavailable(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn process(&mut self, frame: Frame) -> FrameOutcome {
        let mut failed = Vec::new();
        let sequence = frame.sequence;
        let captured_at = frame.captured_at;

        let frame = self.preprocess(frame, &mut failed);

        let detections = match self.run_detection(&frame) {
            Some(Ok(detections)) => Some(detections),
            Some(Err(e)) => {
                tracing::warn!(
                    stage = "detection",
                    sequence = sequence,
                    error = %e,
                    "Detection failed"
                );
                failed.push("detection");
                None
            }
            None => {
                if self.detector_error().is_some() {
                    failed.push("detection");
                }
                None
            }
        };

        let analytics = match &self.settings.analytics {
            Some(options) if options.any() => {
                let report = analytics::analyze(&frame, options, &mut self.movement, &mut failed);
                (!report.is_empty()).then_some(report)
            }
            _ => None,
        };

        tracing::trace!(
            sequence = sequence,
            detections = detections.as_ref().map(|d| d.len()).unwrap_or(0),
            failed = failed.len(),
            "Frame processed"
        );

        FrameOutcome {
            sequence,
            captured_at,
            detections,
            analytics,
            failed_stages: failed,
        }
    }

    fn preprocess(&self, frame: Frame, failed: &mut Vec<&'static str>) -> Frame {
        let opts = &self.settings.preprocess;
        let mut frame = frame;

        if let Some((w, h)) = opts.resize_to {
            frame = apply_step("resize", frame, failed, |f| preprocess::resize(f, w, h));
        }
        if let Some(target) = opts.colorspace {
            frame = apply_step("colorspace", frame, failed, |f| {
                preprocess::convert_color(f, target)
            });
        }
        if opts.denoise {
            frame = apply_step("denoise", frame, failed, preprocess::denoise);
        }
        if let Some(kernel) = opts.blur_kernel {
            frame = apply_step("blur", frame, failed, |f| preprocess::blur(f, kernel));
        }
        if opts.equalize_hist {
            frame = apply_step("equalize_hist", frame, failed, preprocess::equalize);
        }
        frame
    }

    /// None when detection is off or the detector could not be built
    fn run_detection(&mut self, frame: &Frame) -> Option<Result<Vec<Detection>>> {
        let (model_key, config) = self.settings.detection.as_ref()?;

        if let DetectorSlot::Unresolved = self.detector {
            self.detector = match self.registry.instantiate(model_key, config) {
                Ok(detector) => {
                    tracing::info!(model = %model_key, "Detector loaded");
                    DetectorSlot::Ready(detector)
                }
                Err(e) => {
                    // logged once; later frames only mark the stage as failed
                    tracing::error!(model = %model_key, error = %e, "Detector unavailable");
                    DetectorSlot::Unavailable(e.to_string())
                }
            };
        }

        let DetectorSlot::Ready(detector) = &mut self.detector else {
            return None;
        };

        let result = catch_unwind(AssertUnwindSafe(|| detector.detect(frame)));
        Some(match result {
            Ok(result) => result,
            Err(_) => Err(Error::stage("detection", "detector panicked")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(seq: u64) -> Frame {
        let img = RgbImage::from_fn(32, 24, |x, _| Rgb([(x * 8) as u8, 40, 90]));
        Frame::new(DynamicImage::ImageRgb8(img), seq)
    }

    struct FixedDetector;

    impl Detector for FixedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Ok(vec![Detection {
                bbox: [1.0, 2.0, 3.0, 4.0],
                confidence: 0.9,
                class_id: 0,
                class_name: "person".to_string(),
            }])
        }
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            panic!("model crashed");
        }
    }

    fn settings_with_detection() -> PipelineSettings {
        PipelineSettings {
            preprocess: PreprocessOptions::default(),
            detection: Some(("yolov5".to_string(), DetectorConfig::default())),
            analytics: Some(AnalyticsOptions {
                basic_stats: true,
                movement_analysis: true,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_detector_built_once_per_session() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut registry = DetectorRegistry::new();
        registry.register(
            ModelKind::Yolov5,
            Arc::new(move |_: &DetectorConfig| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FixedDetector) as Box<dyn Detector>)
            }),
        );

        let mut pipeline = FramePipeline::new(settings_with_detection(), Arc::new(registry));
        for seq in 1..=3 {
            let outcome = pipeline.process(frame(seq));
            assert_eq!(outcome.detections.as_ref().map(|d| d.len()), Some(1));
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);

        // a new session gets its own detector
        let mut next = FramePipeline::new(settings_with_detection(), pipeline.registry.clone());
        next.process(frame(4));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_detector_panic_does_not_abort_frame() {
        let mut registry = DetectorRegistry::new();
        registry.register(
            ModelKind::Yolov5,
            Arc::new(|_: &DetectorConfig| Ok(Box::new(PanickingDetector) as Box<dyn Detector>)),
        );

        let mut pipeline = FramePipeline::new(settings_with_detection(), Arc::new(registry));
        let outcome = pipeline.process(frame(1));
        assert!(outcome.detections.is_none());
        assert_eq!(outcome.failed_stages, vec!["detection"]);
        assert!(outcome.analytics.unwrap().contains_key("red_mean"));
    }

    #[test]
    fn test_unavailable_model_fails_detection_stage_only() {
        let mut settings = settings_with_detection();
        settings.detection = Some(("poseDetection".to_string(), DetectorConfig::default()));
        let mut pipeline = FramePipeline::new(settings, Arc::new(DetectorRegistry::new()));
        assert!(pipeline.detector_error().is_none());

        let first = pipeline.process(frame(1));
        let second = pipeline.process(frame(2));
        assert!(first.detections.is_none());
        assert_eq!(first.failed_stages, vec!["detection"]);
        assert_eq!(second.failed_stages, vec!["detection"]);
        assert!(second.analytics.unwrap().contains_key("movement_intensity"));
        assert!(pipeline.detector_error().unwrap().contains("poseDetection"));
    }

    #[test]
    fn test_unknown_model_key_is_reported() {
        let mut settings = settings_with_detection();
        settings.detection = Some(("bogusModel".to_string(), DetectorConfig::default()));
        let mut pipeline = FramePipeline::new(settings, Arc::new(DetectorRegistry::new()));

        let outcome = pipeline.process(frame(1));
        assert_eq!(outcome.failed_stages, vec!["detection"]);
        assert!(pipeline.detector_error().unwrap().contains("bogusModel"));
    }

    #[test]
    fn test_failing_preprocess_stage_keeps_frame() {
        let settings = PipelineSettings {
            preprocess: PreprocessOptions {
                resize_to: Some((16, 12)),
                blur_kernel: Some(4),
                ..Default::default()
            },
            detection: None,
            analytics: Some(AnalyticsOptions {
                brightness_analysis: true,
                ..Default::default()
            }),
        };
        let mut pipeline = FramePipeline::new(settings, Arc::new(DetectorRegistry::new()));
        let outcome = pipeline.process(frame(1));
        assert_eq!(outcome.failed_stages, vec!["blur"]);
        assert!(outcome.analytics.unwrap().contains_key("brightness"));
    }
}
