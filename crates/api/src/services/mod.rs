//! Service layer: the sync engine and its collaborators.

pub mod activity_log;
pub mod bulk_sync;
pub mod retry;
pub mod smartrecruiters;
pub mod webhook_processor;

pub use activity_log::ActivityLog;
pub use bulk_sync::BulkSyncService;
pub use retry::{RetryScheduler, RetrySync};
pub use smartrecruiters::{ApiClientError, RecruitingApi, SmartRecruitersClient};
pub use webhook_processor::{SyncError, WebhookProcessor};
