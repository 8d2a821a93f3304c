use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::task::spawn_blocking;

use super::{Result, SharedWebhookStore, StoreError, WEBHOOK_RECORD_KIND, WebhookRecord, WebhookStore};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS webhook_records (
    kind TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// SQLite-backed store. The singleton is the row whose `kind` is
/// [`WEBHOOK_RECORD_KIND`].
#[derive(Clone)]
pub struct SqliteWebhookStore {
    conn: Arc<Mutex<Connection>>,
}

pub fn sqlite_store(path: impl AsRef<Path>) -> anyhow::Result<SharedWebhookStore> {
    Ok(Arc::new(SqliteWebhookStore::open(path)?))
}

impl SqliteWebhookStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLE_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `func` inside one SQLite transaction on the blocking pool.
    async fn with_tx<F, T>(&self, func: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Internal(anyhow::anyhow!("sqlite connection poisoned")))?;
            let tx = guard.transaction().map_err(internal)?;
            let value = func(&tx)?;
            tx.commit().map_err(internal)?;
            Ok(value)
        })
        .await
        .map_err(|err| StoreError::Internal(err.into()))?
    }
}

fn internal(err: rusqlite::Error) -> StoreError {
    StoreError::Internal(err.into())
}

fn load(tx: &Transaction<'_>) -> Result<Option<WebhookRecord>> {
    let row = tx
        .query_row(
            "SELECT url, updated_at FROM webhook_records WHERE kind = ?1",
            params![WEBHOOK_RECORD_KIND],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(internal)?;
    match row {
        Some((url, updated_at)) => {
            let updated_at = OffsetDateTime::parse(&updated_at, &Rfc3339)
                .map_err(|err| StoreError::Internal(err.into()))?;
            Ok(Some(WebhookRecord { url, updated_at }))
        }
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl WebhookStore for SqliteWebhookStore {
    async fn current(&self) -> Result<Option<WebhookRecord>> {
        self.with_tx(load).await
    }

    async fn set_url(&self, url: &str) -> Result<Option<WebhookRecord>> {
        let record = WebhookRecord::new(url);
        let updated_at = record
            .updated_at
            .format(&Rfc3339)
            .map_err(|err| StoreError::Internal(err.into()))?;
        self.with_tx(move |tx| {
            let previous = load(tx)?;
            tx.execute(
                "INSERT INTO webhook_records (kind, url, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(kind) DO UPDATE SET url=excluded.url,
                 updated_at=excluded.updated_at",
                params![WEBHOOK_RECORD_KIND, record.url, updated_at],
            )
            .map_err(internal)?;
            Ok(previous)
        })
        .await
    }

    async fn clear(&self) -> Result<Option<WebhookRecord>> {
        self.with_tx(|tx| {
            let removed = load(tx)?;
            if removed.is_some() {
                tx.execute(
                    "DELETE FROM webhook_records WHERE kind = ?1",
                    params![WEBHOOK_RECORD_KIND],
                )
                .map_err(internal)?;
            }
            Ok(removed)
        })
        .await
    }
}
