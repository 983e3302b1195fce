//! Scheduled bulk sync job.
//!
//! Runs the same reconcile path as the manual trigger, once a day, and
//! persists its outcome as the last-run summary.

use std::sync::Arc;
use std::time::Duration;

use domain::models::sync::SyncOptions;

use super::scheduler::Job;
use crate::services::BulkSyncService;

const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

pub struct BulkSyncJob {
    service: Arc<BulkSyncService>,
    options: SyncOptions,
}

impl BulkSyncJob {
    pub fn new(service: Arc<BulkSyncService>, options: SyncOptions) -> Self {
        Self { service, options }
    }
}

#[async_trait::async_trait]
impl Job for BulkSyncJob {
    fn name(&self) -> &'static str {
        "bulk_sync"
    }

    fn interval(&self) -> Duration {
        DAILY
    }

    async fn run(&self) -> Result<(), String> {
        let report = self.service.reconcile(self.options).await;
        if report.success {
            Ok(())
        } else {
            Err(report.message)
        }
    }
}
