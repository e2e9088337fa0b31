//! Check evaluators - the per-check pass/fail decision.

use std::time::Duration;

use async_trait::async_trait;
use qcflow_core::Verdict;
use tokio::process::Command;

/// Decides whether one group/stream passes a check.
#[async_trait]
pub trait CheckEvaluator: Send + Sync {
    /// Evaluate the data of `(group_id, stream_id)`.
    async fn evaluate(&self, group_id: &str, stream_id: &str) -> Result<bool, anyhow::Error>;
}

/// Evaluator with a fixed outcome.
#[derive(Debug, Clone)]
pub struct StaticEvaluator {
    verdict: Verdict,
}

impl StaticEvaluator {
    /// Always report `verdict`. Anything but `Pass` reports failure.
    pub fn new(verdict: Verdict) -> Self {
        Self { verdict }
    }

    /// Always pass.
    pub fn passing() -> Self {
        Self::new(Verdict::Pass)
    }

    /// Always fail.
    pub fn failing() -> Self {
        Self::new(Verdict::Fail)
    }
}

#[async_trait]
impl CheckEvaluator for StaticEvaluator {
    async fn evaluate(&self, _group_id: &str, _stream_id: &str) -> Result<bool, anyhow::Error> {
        Ok(self.verdict.is_pass())
    }
}

/// Evaluator that runs an external command. Exit code 0 passes.
///
/// The command sees `GROUP_ID` and `STREAM_ID` in its environment.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    command: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandEvaluator {
    /// Create an evaluator for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Set arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Kill the command and report an error after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl CheckEvaluator for CommandEvaluator {
    async fn evaluate(&self, group_id: &str, stream_id: &str) -> Result<bool, anyhow::Error> {
        let start = std::time::Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env("GROUP_ID", group_id)
            .env("STREAM_ID", stream_id)
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", self.command, timeout))??,
            None => cmd.output().await?,
        };

        tracing::debug!(
            command = %self.command,
            exit_code = ?output.status.code(),
            elapsed = ?start.elapsed(),
            "Check command finished"
        );
        if !output.stderr.is_empty() {
            tracing::debug!("{} stderr: {}", self.command, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output.status.success())
    }
}
