//! Store doubles shared by unit tests.

use async_trait::async_trait;
use qcflow_core::{Attribute, RunKey, RunRecord, StatusCode, Verdict};
use qcflow_storage::{Result, StoreError, SummaryStore};

/// Store that refuses every call.
pub(crate) struct DownStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".into())
}

#[async_trait]
impl SummaryStore for DownStore {
    async fn create(&self, _record: &RunRecord) -> Result<StatusCode> {
        Err(down())
    }

    async fn fetch(&self, _key: &RunKey) -> Result<Option<RunRecord>> {
        Err(down())
    }

    async fn update_attribute(
        &self,
        _key: &RunKey,
        _attribute: &Attribute,
        _value: Verdict,
    ) -> Result<StatusCode> {
        Err(down())
    }
}
