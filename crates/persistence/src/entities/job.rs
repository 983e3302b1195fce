//! Job row mapping.

use chrono::{DateTime, Utc};
use domain::models::job::{JobRecord, StoredJob};
use domain::store::StoreError;

/// One row of the `jobs` table. The full record is held as JSONB alongside
/// the scalar columns used for lookups and listing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobEntity {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub status: String,
    pub posting_status: String,
    pub record: serde_json::Value,
    pub last_synced_at: DateTime<Utc>,
    pub sync_status: String,
}

impl TryFrom<JobEntity> for StoredJob {
    type Error = StoreError;

    fn try_from(entity: JobEntity) -> Result<Self, Self::Error> {
        let record: JobRecord = serde_json::from_value(entity.record)
            .map_err(|e| StoreError::Backend(format!("corrupt job record {}: {e}", entity.id)))?;
        Ok(StoredJob {
            id: entity.id,
            record,
            last_synced_at: entity.last_synced_at,
            sync_status: entity.sync_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_converts_to_stored_job() {
        let record = JobRecord {
            external_id: "J1".to_string(),
            title: "Engineer".to_string(),
            ..Default::default()
        };
        let entity = JobEntity {
            id: 7,
            external_id: "J1".to_string(),
            title: "Engineer".to_string(),
            status: String::new(),
            posting_status: String::new(),
            record: serde_json::to_value(&record).unwrap(),
            last_synced_at: Utc::now(),
            sync_status: "synced".to_string(),
        };
        let stored = StoredJob::try_from(entity).unwrap();
        assert_eq!(stored.id, 7);
        assert_eq!(stored.record.external_id, "J1");
    }

    #[test]
    fn test_corrupt_record_is_a_backend_error() {
        let entity = JobEntity {
            id: 7,
            external_id: "J1".to_string(),
            title: String::new(),
            status: String::new(),
            posting_status: String::new(),
            record: serde_json::json!("not a record"),
            last_synced_at: Utc::now(),
            sync_status: "synced".to_string(),
        };
        assert!(matches!(
            StoredJob::try_from(entity),
            Err(StoreError::Backend(_))
        ));
    }
}
