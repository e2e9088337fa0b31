//! JSON file storage implementation.
//!
//! Stores each run as a directory under `runs/<group>/<start>/`. Identity
//! fields live in `identity.json`; every attribute is its own file under
//! `attributes/`, so an attribute write replaces exactly one file and never
//! reads its siblings. Files are written to a temporary name and renamed into
//! place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use qcflow_core::{Attribute, RunKey, RunRecord, StatusCode, Verdict};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::trait_::{assemble, attributes_of, Identity};
use super::{Result, SummaryStore};

/// One attribute file.
#[derive(Debug, Serialize, Deserialize)]
struct AttributeEntry {
    name: String,
    value: Verdict,
}

/// File-based JSON store backend.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Create storage rooted at `root`, creating the `runs/` directory.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("runs")).await?;
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, key: &RunKey) -> PathBuf {
        self.root
            .join("runs")
            .join(encode_segment(&key.group_id))
            .join(encode_segment(&key.start_time_key()))
    }

    fn identity_path(&self, key: &RunKey) -> PathBuf {
        self.run_dir(key).join("identity.json")
    }

    fn attributes_dir(&self, key: &RunKey) -> PathBuf {
        self.run_dir(key).join("attributes")
    }

    fn attribute_path(&self, key: &RunKey, name: &str) -> PathBuf {
        self.attributes_dir(key)
            .join(format!("{}.json", encode_segment(name)))
    }

    async fn write_attribute(&self, key: &RunKey, name: &str, value: Verdict) -> Result<()> {
        let entry = AttributeEntry {
            name: name.to_string(),
            value,
        };
        let json = serde_json::to_string_pretty(&entry)?;
        write_atomic(&self.attribute_path(key, name), json.as_bytes()).await
    }
}

#[async_trait]
impl SummaryStore for JsonStore {
    async fn create(&self, record: &RunRecord) -> Result<StatusCode> {
        let key = record.key();
        let dir = self.run_dir(&key);

        // A put replaces the whole item, including attributes of a prior run
        // that collided on the key.
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Replacing existing run {}", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(self.attributes_dir(&key)).await?;

        let identity = serde_json::to_string_pretty(&Identity::of(record))?;
        write_atomic(&self.identity_path(&key), identity.as_bytes()).await?;

        for (name, value) in attributes_of(record) {
            self.write_attribute(&key, &name, value).await?;
        }
        Ok(StatusCode::OK)
    }

    async fn fetch(&self, key: &RunKey) -> Result<Option<RunRecord>> {
        let Some(identity) = read_json::<Identity>(&self.identity_path(key)).await? else {
            return Ok(None);
        };

        let attributes: BTreeMap<String, Verdict> =
            list_dir::<AttributeEntry>(&self.attributes_dir(key))
                .await?
                .into_iter()
                .map(|entry| (entry.name, entry.value))
                .collect();

        Ok(Some(assemble(key, identity, attributes)))
    }

    async fn update_attribute(
        &self,
        key: &RunKey,
        attribute: &Attribute,
        value: Verdict,
    ) -> Result<StatusCode> {
        fs::create_dir_all(self.attributes_dir(key)).await?;
        self.write_attribute(key, attribute.name(), value).await?;
        Ok(StatusCode::OK)
    }
}

/// Make a key component safe to use as a single path segment.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", ulid::Ulid::new()));
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(items),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}
