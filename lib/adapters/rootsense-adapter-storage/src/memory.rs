use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use rootsense_domain::{Collection, Document, compare_sort_keys, normalize_timestamp};
use rootsense_ports::DocumentStore;

use crate::with_id;

/// Process-local store. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: u64,
    collections: HashMap<Collection, Vec<(u64, Document)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, collection: Collection) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(inner.collections.get(&collection).map_or(0, Vec::len))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: Collection, mut document: Document) -> Result<u64> {
        if !normalize_timestamp(&mut document) {
            tracing::warn!(%collection, "timestamp is not RFC 3339, stored as given");
        }
        let mut inner = self
            .inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        inner.last_id += 1;
        let id = inner.last_id;
        inner
            .collections
            .entry(collection)
            .or_default()
            .push((id, document));
        Ok(id)
    }

    async fn find_latest(
        &self,
        collection: Collection,
        sort_field: &str,
    ) -> Result<Option<Document>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let latest = inner.collections.get(&collection).and_then(|docs| {
            docs.iter().max_by(|(a_id, a), (b_id, b)| {
                compare_sort_keys(a.get(sort_field), b.get(sort_field)).then(a_id.cmp(b_id))
            })
        });
        Ok(latest.map(|(id, doc)| with_id(*id, doc.clone())))
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(inner
            .collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| with_id(*id, doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poisoned_lock_is_reported() {
        let store = InMemoryStore::new();
        store.insert(Collection::Rei, Document::new()).await.unwrap();
        assert_eq!(store.count(Collection::Rei).unwrap(), 1);

        let shared = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(store.count(Collection::Rei).is_err());
        assert!(store.find_all(Collection::Rei).await.is_err());
    }
}
