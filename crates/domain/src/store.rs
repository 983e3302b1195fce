//! Storage seams consumed by the sync engine.
//!
//! The engine never touches a database directly: job records go through
//! [`JobStore`] and small pieces of mutable sync state (webhook secret,
//! retry counters, last-run summary, activity log) through the key-value
//! [`StateStore`]. Production wires the Postgres repositories from the
//! persistence crate; tests wire the in-memory pair.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::job::{JobRecord, StoredJob};

/// Storage failure surfaced to the sync engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The record violates the one-record-per-external-id invariant.
    #[error("duplicate external id: {0}")]
    DuplicateExternalId(String),

    /// A record without a resolvable external id must never be created.
    #[error("record has no external id")]
    MissingExternalId,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Store of local job records, keyed by the remote `external_id`.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<StoredJob>, StoreError>;

    /// Create a record. Fails with [`StoreError::MissingExternalId`] when the
    /// record carries no external id and [`StoreError::DuplicateExternalId`]
    /// when one already exists.
    async fn insert(&self, record: &JobRecord) -> Result<StoredJob, StoreError>;

    /// Replace the record held under the given local id.
    async fn update(&self, id: i64, record: &JobRecord) -> Result<StoredJob, StoreError>;

    /// Remove the record with the given external id; `Ok(None)` when absent.
    async fn delete_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredJob>, StoreError>;

    /// Remove every record, returning how many were dropped.
    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

/// Narrow key-value store for persisted sync state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value; expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Write a value that expires after `ttl`.
    async fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Well-known state keys.
pub mod state_keys {
    /// Shared webhook verification key captured during the handshake.
    pub const WEBHOOK_SECRET: &str = "webhook_secret";
    /// Id of the remote webhook subscription owned by this deployment.
    pub const WEBHOOK_SUBSCRIPTION_ID: &str = "webhook_subscription_id";
    /// Summary of the most recent bulk sync run.
    pub const LAST_RUN: &str = "last_run";
    /// The bounded webhook activity log.
    pub const ACTIVITY_LOG: &str = "activity_log";

    /// Per-job retry attempt counter.
    pub fn retry_attempts(external_id: &str) -> String {
        format!("retry_attempts:{external_id}")
    }
}
