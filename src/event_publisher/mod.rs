//! EventPublisher - durable publication of detection/analytics events
//!
//! One topic per event category. Publishing never fails the caller's loop:
//! errors are logged by the caller and the frame moves on.

use crate::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub const TOPIC_DETECTIONS: &str = "detections";
pub const TOPIC_ANALYTICS: &str = "analytics";

/// Sink for processed-frame events. Called from worker threads.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, event: &Value) -> Result<()>;
}

/// Writes events to the log
#[derive(Debug, Default, Clone)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, topic: &str, event: &Value) -> Result<()> {
        tracing::debug!(topic = %topic, event = %event, "Event published");
        Ok(())
    }
}

/// Events waiting for the broker; beyond this publish reports a transport error
pub const BROKER_QUEUE_CAPACITY: usize = 256;

struct BrokerEvent {
    topic: String,
    body: Value,
}

/// Posts events to `{base_url}/topics/{topic}`.
///
/// Publishing only enqueues; a single task on the async runtime drains the
/// queue, so a slow broker never has more than one request in flight.
pub struct HttpEventPublisher {
    base_url: String,
    tx: mpsc::Sender<BrokerEvent>,
}

impl HttpEventPublisher {
    /// Must be called from within the tokio runtime
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_capacity(base_url, BROKER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(base_url: impl Into<String>, capacity: usize) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("no tokio runtime for event publisher: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let (tx, rx) = mpsc::channel(capacity.max(1));
        runtime.spawn(deliver_events(client, base_url.clone(), rx));

        Ok(Self { base_url, tx })
    }

    pub fn topic_url(&self, topic: &str) -> String {
        topic_url(&self.base_url, topic)
    }
}

fn topic_url(base_url: &str, topic: &str) -> String {
    format!("{}/topics/{}", base_url, topic)
}

async fn deliver_events(
    client: reqwest::Client,
    base_url: String,
    mut rx: mpsc::Receiver<BrokerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let url = topic_url(&base_url, &event.topic);
        match client.post(&url).json(&event.body).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::trace!(topic = %event.topic, "Event delivered to broker");
            }
            Ok(resp) => {
                tracing::warn!(
                    topic = %event.topic,
                    status = %resp.status(),
                    "Broker rejected event"
                );
            }
            Err(e) => {
                tracing::warn!(topic = %event.topic, error = %e, "Broker unreachable");
            }
        }
    }
    tracing::debug!("Broker delivery task stopped");
}

impl EventPublisher for HttpEventPublisher {
    fn publish(&self, topic: &str, event: &Value) -> Result<()> {
        let event = BrokerEvent {
            topic: topic.to_string(),
            body: event.clone(),
        };
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Transport(format!("broker queue full, {} event dropped", topic))
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Transport("broker delivery task stopped".to_string())
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects published events
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        pub events: Mutex<Vec<(String, Value)>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, topic: &str, event: &Value) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((topic.to_string(), event.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_http_topic_url() {
        let publisher = HttpEventPublisher::new("http://broker:8080/").unwrap();
        assert_eq!(
            publisher.topic_url(TOPIC_DETECTIONS),
            "http://broker:8080/topics/detections"
        );
    }

    #[tokio::test]
    async fn test_http_publisher_bounds_pending_events() {
        // unroutable broker: the delivery task holds at most one event
        let publisher = HttpEventPublisher::with_capacity("http://127.0.0.1:9", 2).unwrap();
        let event = serde_json::json!({"camera_id": "a"});

        let results: Vec<Result<()>> = (0..10)
            .map(|_| publisher.publish(TOPIC_DETECTIONS, &event))
            .collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::Transport(_)))));
    }

    #[test]
    fn test_http_publisher_needs_runtime() {
        assert!(HttpEventPublisher::new("http://broker").is_err());
    }

    #[test]
    fn test_tracing_publisher_accepts_everything() {
        let publisher = TracingEventPublisher;
        assert!(publisher
            .publish(TOPIC_ANALYTICS, &serde_json::json!({"camera_id": "a"}))
            .is_ok());
    }
}
