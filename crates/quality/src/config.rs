//! QC configuration - store backend, check set, and notification channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use qcflow_core::{CheckSpec, Verdict};
use qcflow_storage::{JsonStore, MemoryStore, SummaryStore};
use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};
use crate::evaluator::{CheckEvaluator, CommandEvaluator, StaticEvaluator};
use crate::publisher::{
    ConsoleNotifier, LogNotifier, Notifier, ResultPublisher, TopicRouter, WebhookNotifier,
};
use crate::registry::CheckRegistry;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    /// Summary store
    pub store: StoreConfig,

    /// Checks every run fans out to
    pub checks: Vec<CheckConfig>,

    /// Result channel
    pub notification: NotificationConfig,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            checks: (1..=3)
                .map(|i| CheckConfig {
                    name: format!("QCProcess{}", i),
                    attribute: format!("Process{}Pass", i),
                    evaluator: EvaluatorConfig::default(),
                })
                .collect(),
            notification: NotificationConfig::default(),
        }
    }
}

impl QcConfig {
    /// Load and validate a JSON config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| QcError::Config(format!("{}: {}", path.display(), e)))?;
        let config: QcConfig = serde_json::from_str(&content)
            .map_err(|e| QcError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.checks.is_empty() {
            return Err(QcError::Config("At least one check is required".to_string()));
        }
        // Registration enforces unique names and attributes.
        self.build_registry()?;

        if self.notification.topic.trim().is_empty() {
            return Err(QcError::Config("Notification topic cannot be empty".to_string()));
        }
        if let ChannelConfig::Webhook { url } = &self.notification.channel {
            if url.trim().is_empty() {
                return Err(QcError::Config("Webhook channel needs a url".to_string()));
            }
        }
        Ok(())
    }

    /// Build the check registry.
    pub fn build_registry(&self) -> Result<CheckRegistry> {
        let mut registry = CheckRegistry::new();
        for check in &self.checks {
            registry.register(
                CheckSpec::new(check.name.clone(), check.attribute.clone()),
                check.evaluator.build(),
            )?;
        }
        Ok(registry)
    }

    /// Build the result publisher.
    pub fn build_publisher(&self) -> ResultPublisher {
        self.notification.build()
    }
}

/// Store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files under `path`
    #[default]
    Json,
    /// Process memory; nothing survives the process
    Memory,
    /// SQLite database at `path`
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = QcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StoreBackend::Json),
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(QcError::Config(format!("Unknown store backend {}", other))),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend
    pub backend: StoreBackend,

    /// Directory (json) or database file (sqlite)
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            path: PathBuf::from(".qcflow"),
        }
    }
}

impl StoreConfig {
    /// Open the configured store.
    pub async fn open(&self) -> Result<Arc<dyn SummaryStore>> {
        match self.backend {
            StoreBackend::Json => Ok(Arc::new(JsonStore::new(&self.path).await?)),
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite => Ok(Arc::new(
                qcflow_storage::SqliteStore::new(&self.path).await?,
            )),
            #[cfg(not(feature = "sqlite"))]
            StoreBackend::Sqlite => Err(QcError::Config(
                "SQLite backend requires the sqlite feature".to_string(),
            )),
        }
    }
}

/// One configured check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Check name, as carried in `ProcessName`
    pub name: String,

    /// Attribute the check writes on the run record
    pub attribute: String,

    /// Decision function
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

/// Decision function of a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EvaluatorConfig {
    /// Fixed outcome
    Static {
        /// Reported verdict
        #[serde(default = "default_verdict")]
        verdict: Verdict,
    },
    /// External command; exit code 0 passes
    Command {
        /// Program to run
        command: String,
        /// Arguments
        #[serde(default)]
        args: Vec<String>,
        /// Kill after this many seconds
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

fn default_verdict() -> Verdict {
    Verdict::Pass
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig::Static {
            verdict: default_verdict(),
        }
    }
}

impl EvaluatorConfig {
    /// Build the evaluator.
    pub fn build(&self) -> Arc<dyn CheckEvaluator> {
        match self {
            EvaluatorConfig::Static { verdict } => Arc::new(StaticEvaluator::new(*verdict)),
            EvaluatorConfig::Command {
                command,
                args,
                timeout_secs,
            } => {
                let mut evaluator = CommandEvaluator::new(command.clone()).with_args(args.clone());
                if let Some(secs) = timeout_secs {
                    evaluator = evaluator.with_timeout(Duration::from_secs(*secs));
                }
                Arc::new(evaluator)
            }
        }
    }
}

/// Result channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Delivery channel
    pub channel: ChannelConfig,

    /// Default topic
    pub topic: String,

    /// Per-group topic overrides
    pub group_topics: HashMap<String, String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::Console,
            topic: "qc-results".to_string(),
            group_topics: HashMap::new(),
        }
    }
}

impl NotificationConfig {
    /// Build the publisher.
    pub fn build(&self) -> ResultPublisher {
        let notifier: Arc<dyn Notifier> = match &self.channel {
            ChannelConfig::Console => Arc::new(ConsoleNotifier::new()),
            ChannelConfig::Log => Arc::new(LogNotifier),
            ChannelConfig::Webhook { url } => Arc::new(WebhookNotifier::new(url.clone())),
        };
        let router = self
            .group_topics
            .iter()
            .fold(TopicRouter::new(self.topic.clone()), |router, (group, topic)| {
                router.with_group_topic(group.clone(), topic.clone())
            });
        ResultPublisher::new(notifier, router)
    }
}

/// Delivery channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// stderr
    Console,
    /// tracing events
    Log,
    /// HTTP POST
    Webhook {
        /// Endpoint
        url: String,
    },
}
