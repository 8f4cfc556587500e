//! Capture and processing worker loops

use super::signal::StopSignal;
use super::types::{SessionShared, WorkerExit};
use crate::event_publisher::{EventPublisher, TOPIC_ANALYTICS, TOPIC_DETECTIONS};
use crate::frame_queue::{BoundedFrameQueue, PushOutcome};
use crate::pipeline::{DetectorRegistry, FrameOutcome, FramePipeline, PipelineSettings};
use crate::realtime_hub::{HubMessage, RealtimeHub};
use crate::video_source::{Frame, SourceError, SourceGuard, SourceOpener, SourceSpec};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct CaptureWorker {
    pub camera_id: String,
    pub spec: SourceSpec,
    pub opener: SourceOpener,
    pub queue: Arc<BoundedFrameQueue<Frame>>,
    pub stop: StopSignal,
    pub shared: Arc<SessionShared>,
    pub retry_backoff: Duration,
}

impl CaptureWorker {
    pub fn run(self) {
        let _exit = WorkerExit(self.shared.clone());
        let camera_id = self.camera_id.as_str();

        let source = match self.opener.open(&self.spec) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(
                    camera_id = %camera_id,
                    uri = %self.spec.uri,
                    error = %e,
                    "Failed to open video source"
                );
                self.shared.fail(e.to_string());
                self.stop.cancel();
                return;
            }
        };

        // dropped on every exit path below
        let mut source = SourceGuard::new(source);
        self.shared.set_release(source.release_handle());
        tracing::info!(camera_id = %camera_id, uri = %self.spec.uri, "Capture started");

        let mut consecutive_failures = 0u32;
        while !self.stop.is_cancelled() {
            match source.read_frame() {
                Ok(frame) => {
                    if consecutive_failures > 0 {
                        tracing::info!(
                            camera_id = %camera_id,
                            failures = consecutive_failures,
                            "Capture recovered"
                        );
                        consecutive_failures = 0;
                    }
                    self.shared.frames_captured.fetch_add(1, Ordering::Relaxed);
                    if self.queue.push(frame) == PushOutcome::Dropped {
                        tracing::trace!(camera_id = %camera_id, "Queue full, frame dropped");
                    }
                }
                Err(SourceError::Released) if self.stop.is_cancelled() => break,
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        camera_id = %camera_id,
                        error = %e,
                        attempt = consecutive_failures,
                        "Frame read failed, retrying"
                    );
                    if self.stop.sleep(self.retry_backoff) {
                        break;
                    }
                }
            }
        }

        self.shared.clear_release();
        drop(source);
        tracing::info!(camera_id = %camera_id, "Capture stopped");
    }
}

pub(crate) struct ProcessingWorker {
    pub camera_id: String,
    pub site_id: String,
    pub settings: PipelineSettings,
    pub detectors: Arc<DetectorRegistry>,
    pub queue: Arc<BoundedFrameQueue<Frame>>,
    pub stop: StopSignal,
    pub shared: Arc<SessionShared>,
    pub hub: Arc<RealtimeHub>,
    pub publisher: Arc<dyn EventPublisher>,
    pub poll_interval: Duration,
}

impl ProcessingWorker {
    pub fn run(self) {
        let _exit = WorkerExit(self.shared.clone());
        let mut pipeline = FramePipeline::new(self.settings.clone(), self.detectors.clone());
        tracing::info!(camera_id = %self.camera_id, "Processing started");
        let mut detector_reported = false;

        while !self.stop.is_cancelled() {
            let Some(frame) = self.queue.try_pop() else {
                self.stop.sleep(self.poll_interval);
                continue;
            };

            let outcome = pipeline.process(frame);
            self.shared.frames_processed.fetch_add(1, Ordering::Relaxed);
            if !detector_reported {
                if let Some(reason) = pipeline.detector_error() {
                    self.shared.note_error(format!("detection disabled: {}", reason));
                    detector_reported = true;
                }
            }
            self.emit(&outcome);
        }

        let discarded = self.queue.clear();
        drop(pipeline);
        tracing::info!(camera_id = %self.camera_id, discarded = discarded, "Processing stopped");
    }

    fn emit(&self, outcome: &FrameOutcome) {
        let timestamp = outcome.captured_at.to_rfc3339();

        if let Some(detections) = &outcome.detections {
            let event = json!({
                "camera_id": self.camera_id,
                "timestamp": timestamp,
                "sequence": outcome.sequence,
                "detections": detections,
            });
            self.deliver(TOPIC_DETECTIONS, "detection", event);
        }

        if let Some(analytics) = &outcome.analytics {
            let event = json!({
                "camera_id": self.camera_id,
                "timestamp": timestamp,
                "sequence": outcome.sequence,
                "analytics": analytics,
            });
            self.deliver(TOPIC_ANALYTICS, "analytics", event);
        }
    }

    fn deliver(&self, topic: &str, category: &str, event: Value) {
        if let Err(e) = self.publisher.publish(topic, &event) {
            tracing::warn!(
                camera_id = %self.camera_id,
                topic = %topic,
                error = %e,
                "Event publish failed"
            );
        }
        self.hub
            .broadcast(&self.site_id, &HubMessage::update(category, event));
    }
}
