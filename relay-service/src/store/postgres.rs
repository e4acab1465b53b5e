//! PostgreSQL-backed configuration store.
//!
//! Uses runtime queries (`sqlx::query` / `sqlx::query_as`) so the crate
//! builds without a live database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use super::{new_identifier, ConfigStore, StoreError, StoredConfig};
use crate::model::CallbackConfig;

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS ding_callback_configs (
        id SERIAL PRIMARY KEY,
        uuid VARCHAR(36) UNIQUE NOT NULL,
        url TEXT,
        aes_key VARCHAR(100) NOT NULL,
        token VARCHAR(100) NOT NULL,
        corp_id VARCHAR(100) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
";

type ConfigRow = (
    String,
    Option<String>,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// Store backed by the `ding_callback_configs` table.
#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    /// Connect a pool and make sure the table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            // Fail registration/callback fast on pool exhaustion
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await?;

        info!(max_connections = max_connections, "postgres_connected");

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the configuration table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        info!("postgres_schema_ready");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("postgres_pool_closed");
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn insert(&self, config: &CallbackConfig) -> Result<String, StoreError> {
        let uuid = new_identifier();

        sqlx::query(
            r"
            INSERT INTO ding_callback_configs (uuid, url, aes_key, token, corp_id)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&uuid)
        .bind(config.url.as_deref())
        .bind(&config.aes_key)
        .bind(&config.token)
        .bind(&config.tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "postgres_config_insert_failed");
            e
        })?;

        Ok(uuid)
    }

    async fn fetch(&self, uuid: &str) -> Result<Option<StoredConfig>, StoreError> {
        let row: Option<ConfigRow> = sqlx::query_as(
            r"
            SELECT uuid, url, aes_key, token, corp_id, created_at, updated_at
            FROM ding_callback_configs
            WHERE uuid = $1
            ",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(uuid, url, aes_key, token, tenant_id, created_at, updated_at)| StoredConfig {
                uuid,
                config: CallbackConfig {
                    url,
                    aes_key,
                    token,
                    tenant_id,
                },
                created_at,
                updated_at,
            },
        ))
    }
}
