use anyhow::Result;
use async_trait::async_trait;

use rootsense_domain::{Collection, Document, TIMESTAMP_FIELD};

/// Append-only document store shared by every pipeline stage.
///
/// Implementations assign each inserted document an `_id` equal to its
/// insertion sequence number. There are no transactions and no locking
/// guarantees across calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends `document` and returns its assigned `_id`.
    async fn insert(&self, collection: Collection, document: Document) -> Result<u64>;

    /// Document with the greatest `sort_field`; ties go to the later insert.
    async fn find_latest(&self, collection: Collection, sort_field: &str)
    -> Result<Option<Document>>;

    /// Every document in insertion order.
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>>;

    async fn latest(&self, collection: Collection) -> Result<Option<Document>> {
        self.find_latest(collection, TIMESTAMP_FIELD).await
    }
}
