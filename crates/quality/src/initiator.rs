//! Run initiation - creates the run record every check writes into.

use std::sync::Arc;

use qcflow_core::{QcPid, RunRecord, Time};
use qcflow_storage::SummaryStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{required, Result};

/// Input of the start stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Logical batch/source to check
    #[serde(rename = "GroupID", default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Data stream within the group
    #[serde(rename = "StreamID", default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

impl StartRequest {
    /// Request a run for `(group_id, stream_id)`.
    pub fn new(group_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            stream_id: Some(stream_id.into()),
        }
    }
}

/// Source of run start times.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Time;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        chrono::Utc::now()
    }
}

/// Creates run records.
#[derive(Clone)]
pub struct RunInitiator {
    store: Arc<dyn SummaryStore>,
    clock: Arc<dyn Clock>,
}

impl RunInitiator {
    /// Create an initiator writing to `store`.
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a new run.
    ///
    /// Fails only on missing input. A store failure is reported through the
    /// returned record's status code; the record was not persisted in that case.
    pub async fn start(&self, request: &StartRequest) -> Result<RunRecord> {
        let group_id = required(request.group_id.as_ref(), "GroupID")?;
        let stream_id = required(request.stream_id.as_ref(), "StreamID")?;

        let record = RunRecord::new(group_id, stream_id, self.clock.now(), QcPid::new());

        let status = match self.store.create(&record).await {
            Ok(status) => {
                info!(run = %record.key(), qc_pid = %record.qc_pid, "Created QC run");
                status
            }
            Err(e) => {
                warn!(run = %record.key(), "Failed to create QC run: {}", e);
                e.status_code()
            }
        };

        Ok(record.with_status(status))
    }
}
