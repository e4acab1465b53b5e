//! Registered callback configurations.
//!
//! Configurations are written once by the registration endpoint and read
//! on every callback. Two backends:
//! - [`PgConfigStore`]: PostgreSQL via sqlx, used in production
//! - [`MemoryConfigStore`]: process-local map for tests and database-less runs

mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::CallbackConfig;

pub use postgres::PgConfigStore;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A persisted configuration row.
#[derive(Debug, Clone)]
pub struct StoredConfig {
    pub uuid: String,
    pub config: CallbackConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Key-value store for callback configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Persist `config` and return its newly generated identifier.
    async fn insert(&self, config: &CallbackConfig) -> Result<String, StoreError>;

    /// Fetch the configuration registered under `uuid`, if any.
    async fn fetch(&self, uuid: &str) -> Result<Option<StoredConfig>, StoreError>;
}

/// Generate a fresh registration identifier.
pub fn new_identifier() -> String {
    Uuid::new_v4().to_string()
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryConfigStore {
    entries: RwLock<HashMap<String, StoredConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn insert(&self, config: &CallbackConfig) -> Result<String, StoreError> {
        let uuid = new_identifier();
        let now = Utc::now();

        self.entries.write().await.insert(
            uuid.clone(),
            StoredConfig {
                uuid: uuid.clone(),
                config: config.clone(),
                created_at: now,
                updated_at: now,
            },
        );

        Ok(uuid)
    }

    async fn fetch(&self, uuid: &str) -> Result<Option<StoredConfig>, StoreError> {
        Ok(self.entries.read().await.get(uuid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_insert_and_fetch() {
        let store = MemoryConfigStore::new();
        let config = CallbackConfig {
            url: Some("http://tenant.example/hook".to_string()),
            aes_key: "key".to_string(),
            token: "tok1".to_string(),
            tenant_id: "corp1".to_string(),
        };

        let uuid = store.insert(&config).await.unwrap();
        assert!(Uuid::parse_str(&uuid).is_ok());

        let stored = store.fetch(&uuid).await.unwrap().unwrap();
        assert_eq!(stored.uuid, uuid);
        assert_eq!(stored.config, config);
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[tokio::test]
    async fn test_memory_store_unknown_id() {
        let store = MemoryConfigStore::new();
        assert!(store.fetch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identifiers_are_unique() {
        let store = MemoryConfigStore::new();
        let config = CallbackConfig::default();
        let a = store.insert(&config).await.unwrap();
        let b = store.insert(&config).await.unwrap();
        assert_ne!(a, b);
    }
}
