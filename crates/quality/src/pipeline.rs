//! Local workflow driver: start, fan out to every check, fan in, aggregate,
//! publish.

use std::sync::Arc;

use qcflow_core::{CheckInput, CheckResult, RunRecord, StatusCode};
use qcflow_storage::SummaryStore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::aggregator::{Aggregation, Aggregator};
use crate::error::{QcError, Result};
use crate::executor::CheckExecutor;
use crate::initiator::{Clock, RunInitiator, StartRequest};
use crate::publisher::ResultPublisher;
use crate::registry::CheckRegistry;

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Record as created by the start stage
    pub started: RunRecord,

    /// Results of the checks that completed
    pub results: Vec<CheckResult>,

    /// Aggregated record and store cross-check
    pub aggregation: Aggregation,

    /// Status of the publish stage
    pub publish_status: StatusCode,
}

/// Runs the whole QC workflow in-process.
#[derive(Clone)]
pub struct Pipeline {
    initiator: RunInitiator,
    executors: Vec<CheckExecutor>,
    aggregator: Aggregator,
    publisher: ResultPublisher,
}

impl Pipeline {
    /// Wire the stages around one store.
    pub fn new(
        registry: Arc<CheckRegistry>,
        store: Arc<dyn SummaryStore>,
        publisher: ResultPublisher,
    ) -> Self {
        let executors = registry
            .list()
            .iter()
            .map(|check| CheckExecutor::for_check(check, store.clone()))
            .collect();
        Self {
            initiator: RunInitiator::new(store.clone()),
            executors,
            aggregator: Aggregator::new(registry, store),
            publisher,
        }
    }

    /// Use a different clock for start times.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.initiator = self.initiator.with_clock(clock);
        self
    }

    /// Executor of the check named `name`.
    pub fn executor(&self, name: &str) -> Result<&CheckExecutor> {
        self.executors
            .iter()
            .find(|e| e.spec().name == name)
            .ok_or_else(|| QcError::UnknownCheck(name.to_string()))
    }

    /// Run one QC pass for `request`.
    ///
    /// Checks run concurrently. Aggregation starts once every check has
    /// finished; a check task that panics counts as a missing result, even
    /// when no check completed at all.
    pub async fn run(&self, request: &StartRequest) -> Result<RunOutcome> {
        let started = self.initiator.start(request).await?;
        let start_status = started.status_code.unwrap_or(StatusCode::OK);
        if !start_status.is_success() {
            return Err(QcError::StartFailed(start_status));
        }

        let input = CheckInput::from(&started);
        let mut tasks = JoinSet::new();
        for executor in &self.executors {
            let executor = executor.clone();
            let input = input.clone();
            tasks.spawn(async move { executor.execute(&input).await });
        }

        let mut results = Vec::with_capacity(self.executors.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result?),
                Err(e) => warn!(run = %started.key(), "Check task did not complete: {}", e),
            }
        }

        let aggregation = self.aggregator.aggregate_run(&started, &results).await;
        let publish_status = self.publisher.publish(&aggregation.record).await;

        info!(
            run = %started.key(),
            total_pass = %aggregation.record.total_pass,
            %publish_status,
            "QC run finished"
        );

        Ok(RunOutcome {
            started,
            results,
            aggregation,
            publish_status,
        })
    }
}
