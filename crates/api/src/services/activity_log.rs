//! Webhook activity log service.
//!
//! Persists the bounded activity log through the state store so it survives
//! restarts. Logging must never break event processing: storage failures
//! are logged and swallowed.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use domain::models::activity::{record_entry, ActivityLogEntry, ActivityStatus};
use domain::models::webhook::WebhookEventType;
use domain::store::{state_keys, StateStore};

pub struct ActivityLog {
    state: Arc<dyn StateStore>,
    /// Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl ActivityLog {
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self {
            state,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Record an event outcome. With `update_existing` set, a pending
    /// `received` row for the same (event type, job id) is resolved in place.
    pub async fn record(
        &self,
        event_type: &WebhookEventType,
        job_id: &str,
        job_title: &str,
        status: ActivityStatus,
        details: &str,
        update_existing: bool,
    ) {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await;
        record_entry(
            &mut entries,
            Utc::now(),
            event_type.as_str(),
            &event_type.label(),
            job_id,
            job_title,
            status,
            details,
            update_existing,
        );

        let payload = match serde_json::to_value(&entries) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize activity log");
                return;
            }
        };
        if let Err(e) = self.state.put(state_keys::ACTIVITY_LOG, payload).await {
            warn!(error = %e, "Failed to persist activity log");
        }
    }

    /// The retained entries, newest first.
    pub async fn entries(&self) -> Vec<ActivityLogEntry> {
        self.load().await
    }

    async fn load(&self) -> Vec<ActivityLogEntry> {
        match self.state.get(state_keys::ACTIVITY_LOG).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(error = %e, "Corrupt activity log state, starting fresh");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load activity log");
                Vec::new()
            }
        }
    }
}
