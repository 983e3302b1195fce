//! Deferred retry scheduling for skip-classified sync failures.
//!
//! A retry is a one-shot timer keyed by job id: at most one may be pending
//! per id, and the per-job attempt counter (persisted with its own TTL) caps
//! how many fire in a row. Firing re-resolves the job through the same
//! upsert path the webhook processor uses, via the [`RetrySync`] seam.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use domain::models::activity::ActivityStatus;
use domain::models::webhook::WebhookEventType;
use domain::store::{state_keys, StateStore};

use crate::config::RetryConfig;
use crate::services::activity_log::ActivityLog;
use crate::services::webhook_processor::SyncError;

/// Floor for the configured retry delay.
pub const MIN_RETRY_DELAY: Duration = Duration::from_secs(30);

/// The upsert path a fired retry re-enters. Implemented by the webhook
/// processor; the seam breaks the construction cycle between the two.
#[async_trait]
pub trait RetrySync: Send + Sync {
    /// Re-sync a job by id alone. Returns the resolved title on success.
    async fn resync(&self, external_id: &str) -> Result<String, SyncError>;
}

pub struct RetryScheduler {
    state: Arc<dyn StateStore>,
    activity: Arc<ActivityLog>,
    config: RetryConfig,
    pending: Mutex<HashSet<String>>,
}

impl RetryScheduler {
    pub fn new(state: Arc<dyn StateStore>, activity: Arc<ActivityLog>, config: RetryConfig) -> Self {
        Self {
            state,
            activity,
            config,
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn delay(&self) -> Duration {
        Duration::from_secs(self.config.delay_secs).max(MIN_RETRY_DELAY)
    }

    /// Whether a retry timer is currently pending for this id.
    pub fn has_pending(&self, external_id: &str) -> bool {
        self.pending.lock().expect("pending lock").contains(external_id)
    }

    /// Schedule a deferred re-sync for a job. No-op when a retry is already
    /// pending for the id or the attempt cap has been reached.
    pub async fn schedule_retry(self: Arc<Self>, external_id: &str, handler: Arc<dyn RetrySync>) {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return;
        }

        let attempts = self.attempts(external_id).await;
        if attempts >= self.config.max_attempts {
            debug!(job_id = %external_id, attempts, "Retry limit reached");
            return;
        }

        {
            let mut pending = self.pending.lock().expect("pending lock");
            if !pending.insert(external_id.to_string()) {
                return;
            }
        }

        self.record_attempt(external_id, attempts + 1).await;

        let delay = self.delay();
        info!(
            job_id = %external_id,
            attempt = attempts + 1,
            delay_secs = delay.as_secs(),
            "Scheduled job sync retry"
        );
        self.activity
            .record(
                &WebhookEventType::JobRetry,
                external_id,
                "N/A",
                ActivityStatus::Skipped,
                &format!("Retry scheduled in {} seconds", delay.as_secs()),
                false,
            )
            .await;

        let job_id = external_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.on_retry_fire(&job_id, handler).await;
        });
    }

    /// A fired timer: re-sync, clear the counter on success, reschedule on a
    /// renewed transient failure.
    async fn on_retry_fire(self: Arc<Self>, external_id: &str, handler: Arc<dyn RetrySync>) {
        self.pending.lock().expect("pending lock").remove(external_id);
        debug!(job_id = %external_id, "Retry fired");

        match handler.resync(external_id).await {
            Ok(title) => {
                if let Err(e) = self
                    .state
                    .delete(&state_keys::retry_attempts(external_id))
                    .await
                {
                    warn!(job_id = %external_id, error = %e, "Failed to clear retry counter");
                }
                let title: &str = if title.is_empty() { "N/A" } else { title.as_str() };
                self.activity
                    .record(
                        &WebhookEventType::JobRetry,
                        external_id,
                        title,
                        ActivityStatus::Success,
                        "Retry sync succeeded",
                        false,
                    )
                    .await;
            }
            Err(e) if e.is_transient() => {
                self.activity
                    .record(
                        &WebhookEventType::JobRetry,
                        external_id,
                        "N/A",
                        ActivityStatus::Skipped,
                        &e.to_string(),
                        false,
                    )
                    .await;
                Arc::clone(&self).schedule_retry(external_id, handler).await;
            }
            Err(e) => {
                self.activity
                    .record(
                        &WebhookEventType::JobRetry,
                        external_id,
                        "N/A",
                        ActivityStatus::Failed,
                        &e.to_string(),
                        false,
                    )
                    .await;
            }
        }
    }

    async fn attempts(&self, external_id: &str) -> u32 {
        match self.state.get(&state_keys::retry_attempts(external_id)).await {
            Ok(Some(value)) => value.as_u64().unwrap_or(0) as u32,
            Ok(None) => 0,
            Err(e) => {
                warn!(job_id = %external_id, error = %e, "Failed to read retry counter");
                0
            }
        }
    }

    async fn record_attempt(&self, external_id: &str, attempts: u32) {
        let ttl = Duration::from_secs(self.config.attempt_ttl_secs);
        if let Err(e) = self
            .state
            .put_with_ttl(&state_keys::retry_attempts(external_id), json!(attempts), ttl)
            .await
        {
            warn!(job_id = %external_id, error = %e, "Failed to persist retry counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::memory::InMemoryStateStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        outcome: fn() -> Result<String, SyncError>,
    }

    #[async_trait]
    impl RetrySync for CountingHandler {
        async fn resync(&self, _external_id: &str) -> Result<String, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn scheduler() -> (Arc<RetryScheduler>, Arc<dyn StateStore>) {
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let activity = Arc::new(ActivityLog::new(Arc::clone(&state)));
        let scheduler = Arc::new(RetryScheduler::new(
            Arc::clone(&state),
            activity,
            RetryConfig::default(),
        ));
        (scheduler, state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fires_and_clears_counter_on_success() {
        let (scheduler, state) = scheduler();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            outcome: || Ok("Engineer".to_string()),
        });

        scheduler.clone().schedule_retry("J1", handler.clone()).await;
        assert!(scheduler.has_pending("J1"));
        assert_eq!(
            state.get("retry_attempts:J1").await.unwrap(),
            Some(json!(1))
        );

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(!scheduler.has_pending("J1"));
        assert_eq!(state.get("retry_attempts:J1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_retry_is_deduplicated() {
        let (scheduler, _state) = scheduler();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            outcome: || Ok(String::new()),
        });

        scheduler.clone().schedule_retry("J1", handler.clone()).await;
        scheduler.clone().schedule_retry("J1", handler.clone()).await;
        scheduler.clone().schedule_retry("J1", handler.clone()).await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_stop_at_attempt_cap() {
        let (scheduler, _state) = scheduler();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            outcome: || Err(SyncError::EnrichmentPending("HTTP 404".to_string())),
        });

        scheduler.clone().schedule_retry("J1", handler.clone()).await;
        // Let every rescheduled attempt fire
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(
            handler.calls.load(Ordering::SeqCst),
            RetryConfig::default().max_attempts as usize
        );
        assert!(!scheduler.has_pending("J1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_failure_does_not_reschedule() {
        let (scheduler, _state) = scheduler();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            outcome: || Err(SyncError::MissingJobId),
        });

        scheduler.clone().schedule_retry("J1", handler.clone()).await;
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_id_is_ignored() {
        let (scheduler, _state) = scheduler();
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            outcome: || Ok(String::new()),
        });

        scheduler.clone().schedule_retry("  ", handler.clone()).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_delay_floor() {
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let activity = Arc::new(ActivityLog::new(Arc::clone(&state)));
        let scheduler = RetryScheduler::new(
            state,
            activity,
            RetryConfig {
                delay_secs: 5,
                ..Default::default()
            },
        );
        assert_eq!(scheduler.delay(), MIN_RETRY_DELAY);
    }
}
