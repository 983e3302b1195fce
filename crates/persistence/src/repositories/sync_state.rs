//! Sync state repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use domain::store::{StateStore, StoreError};

use crate::metrics::QueryTimer;

/// Repository for the `sync_state` key-value table.
#[derive(Clone)]
pub struct SyncStateRepository {
    pool: PgPool,
}

impl SyncStateRepository {
    /// Creates a new SyncStateRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SyncStateRepository {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let timer = QueryTimer::new("get_sync_state");
        let result = sqlx::query_scalar::<_, serde_json::Value>(
            r#"
            SELECT value FROM sync_state
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result.map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let timer = QueryTimer::new("put_sync_state");
        let result = sqlx::query(
            r#"
            INSERT INTO sync_state (key, value, expires_at)
            VALUES ($1, $2, NULL)
            ON CONFLICT (key)
            DO UPDATE SET value = $2, expires_at = NULL, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn put_with_ttl(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let timer = QueryTimer::new("put_sync_state_ttl");
        let result = sqlx::query(
            r#"
            INSERT INTO sync_state (key, value, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (key)
            DO UPDATE SET value = $2,
                          expires_at = NOW() + make_interval(secs => $3),
                          updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await;
        timer.record();
        result.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let timer = QueryTimer::new("delete_sync_state");
        let result = sqlx::query("DELETE FROM sync_state WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
