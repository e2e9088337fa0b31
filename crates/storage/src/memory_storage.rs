//! In-process storage implementation.
//!
//! Keeps items in a map behind an async lock. Nothing survives the process;
//! used for tests and for single-process local runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use qcflow_core::{Attribute, RunKey, RunRecord, StatusCode, Verdict};
use tokio::sync::RwLock;

use super::trait_::{assemble, attributes_of, Identity};
use super::{Result, SummaryStore};

/// One stored item. Attribute upserts may land before the item is created,
/// in which case it has no identity yet.
#[derive(Debug, Default)]
struct Item {
    identity: Option<Identity>,
    attributes: BTreeMap<String, Verdict>,
}

/// In-memory store backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<RunKey, Item>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items held, including identity-less ones.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the store holds nothing.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn create(&self, record: &RunRecord) -> Result<StatusCode> {
        let item = Item {
            identity: Some(Identity::of(record)),
            attributes: attributes_of(record),
        };
        self.items.write().await.insert(record.key(), item);
        Ok(StatusCode::OK)
    }

    async fn fetch(&self, key: &RunKey) -> Result<Option<RunRecord>> {
        let items = self.items.read().await;
        Ok(items.get(key).and_then(|item| {
            let identity = item.identity.clone()?;
            Some(assemble(key, identity, item.attributes.clone()))
        }))
    }

    async fn update_attribute(
        &self,
        key: &RunKey,
        attribute: &Attribute,
        value: Verdict,
    ) -> Result<StatusCode> {
        self.items
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .attributes
            .insert(attribute.name().to_string(), value);
        Ok(StatusCode::OK)
    }
}
