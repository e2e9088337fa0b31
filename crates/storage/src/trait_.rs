//! Summary store trait abstraction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use qcflow_core::{Attribute, QcPid, RunKey, RunRecord, StatusCode, Verdict, TOTAL_PASS};

/// Error type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded
    #[error("Corrupt item: {0}")]
    Corrupt(String),

    /// No record under the key
    #[error("Not found: {0}")]
    KeyNotFound(RunKey),
}

impl StoreError {
    /// Status code surfaced to callers in place of the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Unavailable(_) | StoreError::Io(_) | StoreError::Corrupt(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Durable keyed store of run records.
///
/// Every operation is keyed by `(GroupID, StartTime)`. Implementations must
/// make `update_attribute` atomic per key and must not read or rewrite any
/// attribute other than the one named.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Write a new record, replacing any record under the same key.
    async fn create(&self, record: &RunRecord) -> Result<StatusCode>;

    /// Read the record under `key`, if one has been created.
    async fn fetch(&self, key: &RunKey) -> Result<Option<RunRecord>>;

    /// Upsert a single attribute.
    async fn update_attribute(
        &self,
        key: &RunKey,
        attribute: &Attribute,
        value: Verdict,
    ) -> Result<StatusCode>;

    /// Read the record under `key`, failing with `KeyNotFound` when absent.
    async fn get(&self, key: &RunKey) -> Result<RunRecord> {
        self.fetch(key)
            .await?
            .ok_or_else(|| StoreError::KeyNotFound(key.clone()))
    }
}

/// Identity fields written at creation time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct Identity {
    #[serde(rename = "StreamID")]
    pub stream_id: String,
    #[serde(rename = "QCPID")]
    pub qc_pid: QcPid,
}

impl Identity {
    pub(crate) fn of(record: &RunRecord) -> Self {
        Self {
            stream_id: record.stream_id.clone(),
            qc_pid: record.qc_pid,
        }
    }
}

/// Attributes a record carries besides its identity.
pub(crate) fn attributes_of(record: &RunRecord) -> BTreeMap<String, Verdict> {
    let mut attributes = record.checks.clone();
    if !record.total_pass.is_unknown() {
        attributes.insert(TOTAL_PASS.to_string(), record.total_pass);
    }
    attributes
}

/// Rebuild a record from its identity and stored attributes.
pub(crate) fn assemble(
    key: &RunKey,
    identity: Identity,
    attributes: BTreeMap<String, Verdict>,
) -> RunRecord {
    let mut record = RunRecord::new(
        key.group_id.clone(),
        identity.stream_id,
        key.start_time,
        identity.qc_pid,
    );
    for (name, value) in attributes {
        record.set_verdict(&Attribute::from_name(&name), value);
    }
    record
}
