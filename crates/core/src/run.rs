//! Run record model - the durable summary of one QC run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::QcPid;
use crate::verdict::{StatusCode, Verdict};
use crate::Time;

/// Attribute name of the aggregate verdict.
pub const TOTAL_PASS: &str = "TotalPass";

/// Keys the run record already uses for identity and bookkeeping. Check
/// attributes must not collide with these.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "GroupID",
    "StartTime",
    "StreamID",
    "QCPID",
    TOTAL_PASS,
    "StatusCode",
];

/// Identity of a run record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    /// Logical batch/source being checked
    #[serde(rename = "GroupID")]
    pub group_id: String,

    /// Run creation timestamp
    #[serde(rename = "StartTime")]
    pub start_time: Time,
}

impl RunKey {
    /// Create a key.
    pub fn new(group_id: impl Into<String>, start_time: Time) -> Self {
        Self {
            group_id: group_id.into(),
            start_time,
        }
    }

    /// Fixed-width rendering of the start time, used by stores as the sort key.
    pub fn start_time_key(&self) -> String {
        self.start_time
            .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.group_id, self.start_time_key())
    }
}

/// The single field an attribute update targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// A per-check verdict, named by the check's attribute name
    Check(String),
    /// The aggregate verdict
    TotalPass,
}

impl Attribute {
    /// Attribute name as stored.
    pub fn name(&self) -> &str {
        match self {
            Attribute::Check(name) => name,
            Attribute::TotalPass => TOTAL_PASS,
        }
    }

    /// Resolve a stored attribute name.
    pub fn from_name(name: &str) -> Self {
        if name == TOTAL_PASS {
            Attribute::TotalPass
        } else {
            Attribute::Check(name.to_string())
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The unit of QC state, keyed by `(GroupID, StartTime)`.
///
/// Per-check verdicts are flattened into the record under their attribute
/// names (`Process1Pass`, ...), matching the shape orchestration steps exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Logical batch/source being checked
    #[serde(rename = "GroupID")]
    pub group_id: String,

    /// Run creation timestamp
    #[serde(rename = "StartTime")]
    pub start_time: Time,

    /// Data stream within the group
    #[serde(rename = "StreamID")]
    pub stream_id: String,

    /// Correlation token for all checks of this run
    #[serde(rename = "QCPID")]
    pub qc_pid: QcPid,

    /// Aggregate verdict
    #[serde(rename = "TotalPass", default, skip_serializing_if = "Verdict::is_unknown")]
    pub total_pass: Verdict,

    /// Outcome of the last store operation
    #[serde(rename = "StatusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,

    /// Per-check verdicts by attribute name
    #[serde(flatten)]
    pub checks: BTreeMap<String, Verdict>,
}

impl RunRecord {
    /// Create a record with every check unset.
    pub fn new(
        group_id: impl Into<String>,
        stream_id: impl Into<String>,
        start_time: Time,
        qc_pid: QcPid,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            start_time,
            stream_id: stream_id.into(),
            qc_pid,
            total_pass: Verdict::Unknown,
            status_code: None,
            checks: BTreeMap::new(),
        }
    }

    /// Identity key of this record.
    pub fn key(&self) -> RunKey {
        RunKey::new(self.group_id.clone(), self.start_time)
    }

    /// Current value of an attribute. Absent checks read as `Unknown`.
    pub fn verdict(&self, attribute: &Attribute) -> Verdict {
        match attribute {
            Attribute::TotalPass => self.total_pass,
            Attribute::Check(name) => self.checks.get(name).copied().unwrap_or_default(),
        }
    }

    /// Overwrite an attribute.
    pub fn set_verdict(&mut self, attribute: &Attribute, verdict: Verdict) {
        match attribute {
            Attribute::TotalPass => self.total_pass = verdict,
            Attribute::Check(name) => {
                self.checks.insert(name.clone(), verdict);
            }
        }
    }

    /// Attach a status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// Aggregate verdict over the expected check attributes.
///
/// `Pass` iff every expected attribute is present and `Pass`. An empty
/// expectation never passes.
pub fn total_verdict<'a, I>(expected: I, checks: &BTreeMap<String, Verdict>) -> Verdict
where
    I: IntoIterator<Item = &'a str>,
{
    let mut any = false;
    for attribute in expected {
        any = true;
        if !checks.get(attribute).is_some_and(|v| v.is_pass()) {
            return Verdict::Fail;
        }
    }
    Verdict::from_passed(any)
}
