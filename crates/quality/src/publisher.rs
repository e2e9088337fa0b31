//! Result publishing - forwards the final run record to a notification channel.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qcflow_core::{RunRecord, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

/// Channel that delivers a message to a topic.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `topic` once. Returns the channel's delivery status.
    async fn publish(&self, topic: &str, message: &str) -> Result<StatusCode, anyhow::Error>;
}

/// Writes `[topic] message` lines to stderr, or to a supplied writer.
///
/// Never writes to stdout, which carries the stage output.
#[derive(Clone)]
pub struct ConsoleNotifier {
    out: Arc<Mutex<dyn Write + Send>>,
}

impl ConsoleNotifier {
    /// Notifier writing to stderr.
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }

    /// Notifier writing to `out`.
    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<StatusCode, anyhow::Error> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer poisoned"))?;
        writeln!(out, "[{}] {}", topic, message)?;
        out.flush()?;
        Ok(StatusCode::OK)
    }
}

/// Emits messages as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<StatusCode, anyhow::Error> {
        info!(topic, message, "QC summary");
        Ok(StatusCode::OK)
    }
}

/// Posts `{"topic": ..., "message": ...}` to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<StatusCode, anyhow::Error> {
        let body = serde_json::json!({
            "topic": topic,
            "message": message,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        Ok(StatusCode(response.status().as_u16()))
    }
}

/// Chooses the topic for a run.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    default_topic: String,
    group_topics: HashMap<String, String>,
}

impl TopicRouter {
    /// Route every group to `default_topic`.
    pub fn new(default_topic: impl Into<String>) -> Self {
        Self {
            default_topic: default_topic.into(),
            group_topics: HashMap::new(),
        }
    }

    /// Route `group_id` to its own topic.
    pub fn with_group_topic(
        mut self,
        group_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        self.group_topics.insert(group_id.into(), topic.into());
        self
    }

    /// Topic for `group_id`.
    pub fn topic_for(&self, group_id: &str) -> &str {
        self.group_topics
            .get(group_id)
            .map(String::as_str)
            .unwrap_or(&self.default_topic)
    }
}

/// Sends aggregated run records downstream. At most one send per call; no retry.
#[derive(Clone)]
pub struct ResultPublisher {
    notifier: Arc<dyn Notifier>,
    router: TopicRouter,
}

impl ResultPublisher {
    /// Create a publisher.
    pub fn new(notifier: Arc<dyn Notifier>, router: TopicRouter) -> Self {
        Self { notifier, router }
    }

    /// Publish `record`. Channel failures come back as `502`.
    pub async fn publish(&self, record: &RunRecord) -> StatusCode {
        match serde_json::to_value(record) {
            Ok(payload) => self.publish_json(&payload).await,
            Err(e) => {
                warn!(run = %record.key(), "Failed to serialize run record: {}", e);
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Publish an arbitrary JSON payload as-is.
    ///
    /// The topic is chosen from the payload's `GroupID`; a payload without one
    /// goes to the default topic.
    pub async fn publish_json(&self, payload: &Value) -> StatusCode {
        let group_id = payload.get("GroupID").and_then(Value::as_str).unwrap_or_default();
        let topic = self.router.topic_for(group_id);
        let message = payload.to_string();

        match self.notifier.publish(topic, &message).await {
            Ok(status) if status.is_success() => {
                info!(group_id, topic, %status, "Published QC summary");
                status
            }
            Ok(status) => {
                warn!(group_id, topic, %status, "Channel rejected QC summary");
                status
            }
            Err(e) => {
                warn!(group_id, topic, "Failed to publish QC summary: {}", e);
                StatusCode::BAD_GATEWAY
            }
        }
    }
}
