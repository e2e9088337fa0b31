//! Check execution - one parameterized executor per configured check.

use std::sync::Arc;

use qcflow_core::{CheckInput, CheckResult, CheckSpec, RunKey, Verdict};
use qcflow_storage::SummaryStore;
use tracing::{debug, info, warn};

use crate::error::{present, required, Result};
use crate::evaluator::CheckEvaluator;
use crate::registry::RegisteredCheck;

/// Runs one check and records its verdict on the run record.
///
/// Each executor owns exactly one attribute, so executors of the same run can
/// run concurrently without coordinating.
#[derive(Clone)]
pub struct CheckExecutor {
    spec: CheckSpec,
    evaluator: Arc<dyn CheckEvaluator>,
    store: Arc<dyn SummaryStore>,
}

impl CheckExecutor {
    /// Create an executor for `spec`.
    pub fn new(
        spec: CheckSpec,
        evaluator: Arc<dyn CheckEvaluator>,
        store: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            spec,
            evaluator,
            store,
        }
    }

    /// Create an executor for a registered check.
    pub fn for_check(check: &RegisteredCheck, store: Arc<dyn SummaryStore>) -> Self {
        Self::new(check.spec.clone(), check.evaluator.clone(), store)
    }

    /// Identity of the check this executor runs.
    pub fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    /// Run the check and write its single attribute.
    ///
    /// Re-running with the same input rewrites the same attribute. An
    /// evaluator error is recorded as a failure; a store error is reported in
    /// the result's status code.
    pub async fn execute(&self, input: &CheckInput) -> Result<CheckResult> {
        let group_id = required(input.group_id.as_ref(), "GroupID")?;
        let stream_id = required(input.stream_id.as_ref(), "StreamID")?;
        let start_time = present(input.start_time, "StartTime")?;
        let qc_pid = present(input.qc_pid, "QCPID")?;
        let key = RunKey::new(group_id, start_time);

        debug!(check = %self.spec.name, run = %key, "Running check");
        let verdict = match self.evaluator.evaluate(group_id, stream_id).await {
            Ok(passed) => Verdict::from_passed(passed),
            Err(e) => {
                warn!(
                    check = %self.spec.name,
                    run = %key,
                    "Check errored, recording failure: {}",
                    e
                );
                Verdict::Fail
            }
        };

        let status = match self
            .store
            .update_attribute(&key, &self.spec.target(), verdict)
            .await
        {
            Ok(status) => {
                info!(check = %self.spec.name, run = %key, %verdict, "Recorded check verdict");
                status
            }
            Err(e) => {
                warn!(check = %self.spec.name, run = %key, "Failed to record verdict: {}", e);
                e.status_code()
            }
        };

        Ok(CheckResult {
            check_name: self.spec.name.clone(),
            group_id: group_id.to_string(),
            start_time,
            stream_id: stream_id.to_string(),
            qc_pid,
            pass: verdict,
            status_code: Some(status),
        })
    }
}
