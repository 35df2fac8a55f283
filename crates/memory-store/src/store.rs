use std::collections::HashMap;
use std::sync::Arc;

use model::dataset::MemoryDataset;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::MemoryStoreError;
use crate::key::normalize;

/// The per-run memory dataset store (C3): a normalized-key -> dataset
/// map, guarded by a single read/write lock (§5 "the memory store is
/// protected by a read/write lock; mutation occurs only during
/// memory-select execution"). One instance is owned per pipeline run and
/// dropped with it (§3 "Ownership").
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, MemoryDataset>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has(&self, raw_key: &str) -> Result<bool, MemoryStoreError> {
        let key = normalize(raw_key)?;
        Ok(self.inner.read().await.contains_key(&key))
    }

    /// Registers `dataset` under `raw_key`. Write-once: a second `put`
    /// for the same normalized key fails and leaves the first value in
    /// place (§3 "write-once", §8 property 7).
    pub async fn put(&self, raw_key: &str, dataset: MemoryDataset) -> Result<(), MemoryStoreError> {
        let key = normalize(raw_key)?;
        let mut guard = self.inner.write().await;
        if guard.contains_key(&key) {
            return Err(MemoryStoreError::AlreadyExists(key));
        }
        debug!(key = %key, rows = dataset.row_count(), "materialized memory dataset");
        guard.insert(key, dataset);
        Ok(())
    }

    pub async fn get(&self, raw_key: &str) -> Result<MemoryDataset, MemoryStoreError> {
        let key = normalize(raw_key)?;
        self.inner
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(MemoryStoreError::NotFound(key))
    }

    /// Invoked only at pipeline end (§4.3); drops every dataset so the
    /// store can be reused or simply discarded with the run.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> MemoryDataset {
        MemoryDataset::new(vec!["a".into()], vec![None], vec![])
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store.put("Cadastro de Clientes", dataset()).await.unwrap();
        assert!(store.has("cadastro_de_clientes").await.unwrap());
        let ds = store.get("CADASTRO DE CLIENTES").await.unwrap();
        assert_eq!(ds.columns, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn second_put_for_same_key_fails() {
        let store = MemoryStore::new();
        store.put("k", dataset()).await.unwrap();
        let err = store.put("k", dataset()).await.unwrap_err();
        assert!(matches!(err, MemoryStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, MemoryStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_puts_yield_exactly_one_success() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.put("race", dataset()).await }));
        }
        let mut ok_count = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok_count += 1;
            }
        }
        assert_eq!(ok_count, 1);
    }

    #[tokio::test]
    async fn clear_removes_all_datasets() {
        let store = MemoryStore::new();
        store.put("k", dataset()).await.unwrap();
        store.clear().await;
        assert!(!store.has("k").await.unwrap());
    }
}
