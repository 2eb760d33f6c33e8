use std::path::Path;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

use rootsense_domain::{Collection, Document, ID_FIELD, normalize_timestamp};
use rootsense_ports::DocumentStore;

use crate::with_id;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection, id);
";

/// Documents stored as JSON text in a single table, shared between worker
/// processes through the database file.
///
/// "Latest" ordering uses SQLite's value ordering on `json_extract`: missing
/// and JSON `null` sort lowest, numbers before text, and booleans compare as
/// 0/1 integers.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .with_context(|| format!("failed to open sqlite store at {}", path.display()))?;
        let store = Self::from_pool(pool)?;
        tracing::debug!(path = %path.display(), "sqlite store opened");
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .context("failed to open in-memory sqlite store")?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        let conn = pool.get().context("failed to acquire sqlite connection")?;
        conn.execute_batch(SCHEMA)
            .context("failed to create documents table")?;
        Ok(Self { pool })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().context("failed to acquire sqlite connection")?;
            op(&conn)
        })
        .await
        .map_err(|err| anyhow!("sqlite task failed: {err}"))?
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: Collection, mut document: Document) -> Result<u64> {
        document.remove(ID_FIELD);
        if !normalize_timestamp(&mut document) {
            tracing::warn!(%collection, "timestamp is not RFC 3339, stored as given");
        }
        let body = serde_json::to_string(&document).context("failed to encode document")?;
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection.as_str(), body],
            )
            .with_context(|| format!("failed to insert into {collection}"))?;
            Ok(conn.last_insert_rowid() as u64)
        })
        .await
    }

    async fn find_latest(
        &self,
        collection: Collection,
        sort_field: &str,
    ) -> Result<Option<Document>> {
        let path = json_path(sort_field);
        let row = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT id, body FROM documents WHERE collection = ?1 \
                     ORDER BY json_extract(body, ?2) DESC, id DESC LIMIT 1",
                    params![collection.as_str(), path],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .with_context(|| format!("failed to query latest from {collection}"))
            })
            .await?;
        row.map(|(id, body)| decode(id, &body)).transpose()
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>> {
        let rows = self
            .blocking(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")
                    .context("failed to prepare find_all")?;
                let rows = stmt
                    .query_map(params![collection.as_str()], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .with_context(|| format!("failed to read {collection}"))?;
                Ok(rows)
            })
            .await?;
        rows.iter().map(|(id, body)| decode(*id, body)).collect()
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn decode(id: i64, body: &str) -> Result<Document> {
    let doc: Document = serde_json::from_str(body)
        .with_context(|| format!("document {id} is not a JSON object"))?;
    Ok(with_id(id as u64, doc))
}
