//! Domain models for the jobsync backend.

pub mod activity;
pub mod job;
pub mod sync;
pub mod webhook;

pub use activity::{ActivityLogEntry, ActivityStatus, ACTIVITY_LOG_CAPACITY};
pub use job::{JobAdSection, JobProperty, JobRecord, StoredJob};
pub use sync::{LastRun, SyncOptions, SyncReport};
pub use webhook::{HeaderContext, NormalizeError, NormalizedEvent, WebhookEventType};
