use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use crate::client::ConfigStore;

/// In-process config store with the same path semantics as etcd v2.
/// Used by tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    /// Writes under any of these prefixes fail.
    failing: RwLock<Vec<String>>,
    /// Deletes under any of these prefixes fail.
    failing_deletes: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` under `prefix` fail.
    pub async fn fail_writes_under(&self, prefix: &str) {
        self.failing.write().await.push(prefix.to_string());
    }

    /// Make every subsequent `delete` under `prefix` fail.
    pub async fn fail_deletes_under(&self, prefix: &str) {
        self.failing_deletes.write().await.push(prefix.to_string());
    }

    /// Snapshot of every stored leaf key and value.
    pub async fn dump(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self
            .failing
            .read()
            .await
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
        {
            return Err(anyhow::anyhow!("write to {} rejected", key));
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str, recursive: bool) -> anyhow::Result<bool> {
        if self
            .failing_deletes
            .read()
            .await
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
        {
            return Err(anyhow::anyhow!("delete of {} rejected", key));
        }
        let mut entries = self.entries.write().await;
        let mut removed = entries.remove(key).is_some();
        if recursive {
            let prefix = format!("{}/", key);
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(&prefix));
            removed |= entries.len() != before;
        }
        Ok(removed)
    }

    async fn list(&self, dir: &str) -> anyhow::Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let entries = self.entries.read().await;
        let children: BTreeSet<String> = entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(|child| format!("{}{}", prefix, child))
            .collect();
        Ok(children.into_iter().collect())
    }
}
