//! Document store adapters.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use rootsense_domain::{Document, ID_FIELD, StoreBackend, StoreConfig};
use rootsense_ports::DocumentStore;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Builds the store selected by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    Ok(match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.sqlite_path)?),
    })
}

/// Returns `doc` with `_id` as its first field.
pub(crate) fn with_id(id: u64, doc: Document) -> Document {
    let mut out = Document::with_capacity(doc.len() + 1);
    out.insert(ID_FIELD.to_string(), Value::from(id));
    out.extend(doc.into_iter().filter(|(key, _)| key != ID_FIELD));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootsense_domain::Collection;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn latest_prefers_greatest_timestamp(store: &dyn DocumentStore) {
        store
            .insert(
                Collection::SystemStats,
                doc(json!({"timestamp": "2025-01-01T10:00:00.000000Z", "cpu_usage": 3})),
            )
            .await
            .unwrap();
        store
            .insert(
                Collection::SystemStats,
                doc(json!({"timestamp": "2025-01-01T12:00:00.000000Z", "cpu_usage": 9})),
            )
            .await
            .unwrap();
        store
            .insert(
                Collection::SystemStats,
                doc(json!({"timestamp": "2025-01-01T11:00:00.000000Z", "cpu_usage": 5})),
            )
            .await
            .unwrap();

        let latest = store.latest(Collection::SystemStats).await.unwrap().unwrap();
        assert_eq!(latest.get("cpu_usage"), Some(&json!(9)));
        assert_eq!(latest.keys().next().map(String::as_str), Some(ID_FIELD));
    }

    async fn ties_go_to_later_insert(store: &dyn DocumentStore) {
        let ts = "2025-01-01T10:00:00.000000Z";
        store
            .insert(Collection::Rei, doc(json!({"timestamp": ts, "n": 1})))
            .await
            .unwrap();
        let second = store
            .insert(Collection::Rei, doc(json!({"timestamp": ts, "n": 2})))
            .await
            .unwrap();

        let latest = store.latest(Collection::Rei).await.unwrap().unwrap();
        assert_eq!(latest.get("n"), Some(&json!(2)));
        assert_eq!(latest.get(ID_FIELD), Some(&json!(second)));
    }

    async fn mixed_timestamp_forms_order_by_instant(store: &dyn DocumentStore) {
        // 12:00+05:00 is 07:00 UTC, an hour before the second sample.
        for (ts, cpu) in [("2025-06-01T12:00:00+05:00", 1), ("2025-06-01T08:00:00Z", 2)] {
            store
                .insert(Collection::SystemStats, doc(json!({"timestamp": ts, "cpu_usage": cpu})))
                .await
                .unwrap();
        }
        let latest = store.latest(Collection::SystemStats).await.unwrap().unwrap();
        assert_eq!(latest.get("cpu_usage"), Some(&json!(2)));
        assert_eq!(latest["timestamp"], json!("2025-06-01T08:00:00.000000Z"));

        for (ts, n) in [("2025-06-01T10:00:00.5Z", "later"), ("2025-06-01T10:00:00Z", "earlier")] {
            store
                .insert(Collection::RootCause, doc(json!({"timestamp": ts, "n": n})))
                .await
                .unwrap();
        }
        let latest = store.latest(Collection::RootCause).await.unwrap().unwrap();
        assert_eq!(latest.get("n"), Some(&json!("later")));
    }

    async fn missing_sort_field_ranks_lowest(store: &dyn DocumentStore) {
        store
            .insert(Collection::RootCause, doc(json!({"timestamp": "2020-01-01T00:00:00.000000Z", "cause": "disk"})))
            .await
            .unwrap();
        store
            .insert(Collection::RootCause, doc(json!({"cause": "unstamped"})))
            .await
            .unwrap();

        let latest = store.latest(Collection::RootCause).await.unwrap().unwrap();
        assert_eq!(latest.get("cause"), Some(&json!("disk")));
    }

    async fn find_all_keeps_insertion_order_and_collections_apart(store: &dyn DocumentStore) {
        for metric in ["cpu_usage", "memory_percent"] {
            store
                .insert(Collection::Predictions, doc(json!({"metric": metric})))
                .await
                .unwrap();
        }
        let all = store.find_all(Collection::Predictions).await.unwrap();
        let metrics: Vec<_> = all.iter().map(|d| d["metric"].clone()).collect();
        assert_eq!(metrics, vec![json!("cpu_usage"), json!("memory_percent")]);
        assert!(store.latest(Collection::SystemStats).await.unwrap().is_none());
        assert!(store.find_all(Collection::SystemStats).await.unwrap().is_empty());
    }

    async fn field_order_survives_storage(store: &dyn DocumentStore) {
        store
            .insert(
                Collection::SystemStats,
                doc(json!({"zeta": 1, "alpha": 2, "mid": 3, "_id": 999})),
            )
            .await
            .unwrap();
        let stored = store.find_all(Collection::SystemStats).await.unwrap();
        let keys: Vec<_> = stored[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec![ID_FIELD, "zeta", "alpha", "mid"]);
        assert_ne!(stored[0][ID_FIELD], json!(999));
    }

    #[tokio::test]
    async fn memory_store_contract() {
        latest_prefers_greatest_timestamp(&InMemoryStore::new()).await;
        ties_go_to_later_insert(&InMemoryStore::new()).await;
        mixed_timestamp_forms_order_by_instant(&InMemoryStore::new()).await;
        missing_sort_field_ranks_lowest(&InMemoryStore::new()).await;
        find_all_keeps_insertion_order_and_collections_apart(&InMemoryStore::new()).await;
        field_order_survives_storage(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let open = |name: &str| SqliteStore::open(dir.path().join(name)).unwrap();
        latest_prefers_greatest_timestamp(&open("a.db")).await;
        ties_go_to_later_insert(&open("b.db")).await;
        mixed_timestamp_forms_order_by_instant(&open("e.db")).await;
        missing_sort_field_ranks_lowest(&open("c.db")).await;
        find_all_keeps_insertion_order_and_collections_apart(&open("d.db")).await;
        field_order_survives_storage(&SqliteStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn sqlite_store_is_shared_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shared.db");
        let writer = SqliteStore::open(&path).unwrap();
        writer
            .insert(Collection::Rei, doc(json!({"overall_score": 95.0})))
            .await
            .unwrap();

        let reader = SqliteStore::open(&path).unwrap();
        let all = reader.find_all(Collection::Rei).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["overall_score"], json!(95.0));
    }

    #[test]
    fn open_store_honours_backend() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        assert!(open_store(&config).is_ok());
    }
}
