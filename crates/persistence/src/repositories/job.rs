//! Job repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::job::{JobRecord, StoredJob};
use domain::store::{JobStore, StoreError};

use crate::entities::JobEntity;
use crate::metrics::QueryTimer;

const JOB_COLUMNS: &str =
    "id, external_id, title, status, posting_status, record, last_synced_at, sync_status";

/// Repository for job-record database operations.
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Creates a new JobRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_error(err: sqlx::Error, external_id: &str) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::DuplicateExternalId(external_id.to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredJob>, StoreError> {
        let timer = QueryTimer::new("find_job_by_external_id");
        let result = sqlx::query_as::<_, JobEntity>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(StoredJob::try_from)
            .transpose()
    }

    async fn insert(&self, record: &JobRecord) -> Result<StoredJob, StoreError> {
        if !record.has_external_id() {
            return Err(StoreError::MissingExternalId);
        }
        let payload =
            serde_json::to_value(record).map_err(|e| StoreError::Backend(e.to_string()))?;

        let timer = QueryTimer::new("insert_job");
        let result = sqlx::query_as::<_, JobEntity>(&format!(
            r#"
            INSERT INTO jobs (external_id, title, status, posting_status, record,
                              last_synced_at, sync_status)
            VALUES ($1, $2, $3, $4, $5, NOW(), 'synced')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.status)
        .bind(&record.posting_status)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
            .map_err(|e| Self::map_error(e, &record.external_id))?
            .try_into()
    }

    async fn update(&self, id: i64, record: &JobRecord) -> Result<StoredJob, StoreError> {
        if !record.has_external_id() {
            return Err(StoreError::MissingExternalId);
        }
        let payload =
            serde_json::to_value(record).map_err(|e| StoreError::Backend(e.to_string()))?;

        let timer = QueryTimer::new("update_job");
        let result = sqlx::query_as::<_, JobEntity>(&format!(
            r#"
            UPDATE jobs
            SET external_id = $2, title = $3, status = $4, posting_status = $5,
                record = $6, last_synced_at = NOW(), sync_status = 'synced',
                updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.status)
        .bind(&record.posting_status)
        .bind(&payload)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(|e| Self::map_error(e, &record.external_id))?
            .ok_or_else(|| StoreError::NotFound(format!("job id {id}")))?
            .try_into()
    }

    async fn delete_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StoredJob>, StoreError> {
        let timer = QueryTimer::new("delete_job_by_external_id");
        let result = sqlx::query_as::<_, JobEntity>(&format!(
            "DELETE FROM jobs WHERE external_id = $1 RETURNING {JOB_COLUMNS}"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(StoredJob::try_from)
            .transpose()
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let timer = QueryTimer::new("delete_all_jobs");
        let result = sqlx::query("DELETE FROM jobs").execute(&self.pool).await;
        timer.record();
        Ok(result
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .rows_affected())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let timer = QueryTimer::new("count_jobs");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result.map_err(|e| StoreError::Backend(e.to_string()))
    }
}
