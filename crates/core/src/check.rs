//! Check model - identities, inputs, and direct outputs of QC checks.

use serde::{Deserialize, Serialize};

use crate::id::QcPid;
use crate::run::{Attribute, RunKey, RunRecord};
use crate::verdict::{StatusCode, Verdict};
use crate::Time;

/// Identity of one check: the name it reports under and the record attribute
/// it owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Check name, e.g. `QCProcess1`
    pub name: String,

    /// Record attribute this check writes, e.g. `Process1Pass`
    pub attribute: String,
}

impl CheckSpec {
    /// Create a check identity.
    pub fn new(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
        }
    }

    /// The attribute as an update target.
    pub fn target(&self) -> Attribute {
        Attribute::Check(self.attribute.clone())
    }
}

/// Input handed to every check of a run.
///
/// All fields are optional on the wire; executors reject input that lacks any
/// of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckInput {
    /// Logical batch/source
    #[serde(rename = "GroupID", default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Data stream
    #[serde(rename = "StreamID", default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,

    /// Run start time
    #[serde(rename = "StartTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,

    /// Run correlation token
    #[serde(rename = "QCPID", default, skip_serializing_if = "Option::is_none")]
    pub qc_pid: Option<QcPid>,
}

impl From<&RunRecord> for CheckInput {
    fn from(record: &RunRecord) -> Self {
        Self {
            group_id: Some(record.group_id.clone()),
            stream_id: Some(record.stream_id.clone()),
            start_time: Some(record.start_time),
            qc_pid: Some(record.qc_pid),
        }
    }
}

/// Direct output of one check, handed to the aggregator independently of the
/// store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check that produced this result
    #[serde(rename = "ProcessName")]
    pub check_name: String,

    /// Logical batch/source
    #[serde(rename = "GroupID")]
    pub group_id: String,

    /// Run start time
    #[serde(rename = "StartTime")]
    pub start_time: Time,

    /// Data stream
    #[serde(rename = "StreamID")]
    pub stream_id: String,

    /// Run correlation token
    #[serde(rename = "QCPID")]
    pub qc_pid: QcPid,

    /// The check's verdict
    #[serde(rename = "Pass")]
    pub pass: Verdict,

    /// Outcome of the check's attribute write
    #[serde(rename = "StatusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,
}

impl CheckResult {
    /// Identity key of the run this result belongs to.
    pub fn key(&self) -> RunKey {
        RunKey::new(self.group_id.clone(), self.start_time)
    }
}
