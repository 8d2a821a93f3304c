//! Singleton store for the camera server webhook URL.
//!
//! At most one [`WebhookRecord`] exists at any time. Registering overwrites it,
//! unregistering removes it, and no history is kept. Both operations run as a
//! read-then-write inside the backend's own transaction primitive; there is no
//! version check, so concurrent writers race and the last write wins.

use std::sync::Arc;

use anyhow::Error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[cfg(feature = "store_sqlite")]
mod sqlite;
#[cfg(feature = "store_sqlite")]
pub use sqlite::{SqliteWebhookStore, sqlite_store};

/// Entity kind the singleton record is keyed by.
pub const WEBHOOK_RECORD_KIND: &str = "cameraBotWebhookUrl";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookRecord {
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl WebhookRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("webhook store error")]
    Internal(#[source] Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait WebhookStore: Send + Sync {
    /// Current record, `None` when nothing is registered.
    async fn current(&self) -> Result<Option<WebhookRecord>>;

    /// Create or overwrite the record with `url`. Returns the replaced record.
    async fn set_url(&self, url: &str) -> Result<Option<WebhookRecord>>;

    /// Delete the record. Returns what was removed; an empty store is a no-op.
    async fn clear(&self) -> Result<Option<WebhookRecord>>;
}

pub type SharedWebhookStore = Arc<dyn WebhookStore>;

#[derive(Clone, Default)]
pub struct InMemoryWebhookStore {
    inner: Arc<RwLock<Option<WebhookRecord>>>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedWebhookStore {
        Arc::new(Self::new())
    }
}

pub fn memory_store() -> SharedWebhookStore {
    InMemoryWebhookStore::shared()
}

#[async_trait::async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn current(&self) -> Result<Option<WebhookRecord>> {
        Ok(self.inner.read().await.clone())
    }

    async fn set_url(&self, url: &str) -> Result<Option<WebhookRecord>> {
        let mut guard = self.inner.write().await;
        let previous = guard.replace(WebhookRecord::new(url));
        tracing::debug!(
            kind = WEBHOOK_RECORD_KIND,
            url,
            replaced = previous.is_some(),
            "webhook record saved"
        );
        Ok(previous)
    }

    async fn clear(&self) -> Result<Option<WebhookRecord>> {
        let removed = self.inner.write().await.take();
        tracing::debug!(
            kind = WEBHOOK_RECORD_KIND,
            removed = removed.is_some(),
            "webhook record cleared"
        );
        Ok(removed)
    }
}
