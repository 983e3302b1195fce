//! Webhook event dispatch.
//!
//! Takes a [`NormalizedEvent`] and applies it to the local store: upsert for
//! create/update/status events (and, optimistically, for unrecognized event
//! types), delete for the deletion events. Payloads that arrive without
//! detail fields are enriched through the remote API first; an enrichment
//! failure is a skip, not a hard failure, and skips schedule a bounded
//! retry. Every outcome lands in the activity log, resolving the `received`
//! row in place.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use domain::models::activity::ActivityStatus;
use domain::models::webhook::{NormalizedEvent, WebhookEventType};
use domain::services::mapper::map_job;
use domain::store::{JobStore, StoreError};

use crate::services::activity_log::ActivityLog;
use crate::services::retry::{RetryScheduler, RetrySync};
use crate::services::smartrecruiters::{ApiClientError, RecruitingApi};

/// A single job sync failure, classified for skip-vs-fail handling.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("missing job id in payload")]
    MissingJobId,

    /// Detail enrichment did not complete; the job may simply not be
    /// readable on the remote side yet.
    #[error("waiting for remote job details: {0}")]
    EnrichmentPending(String),

    #[error("job details still incomplete (missing title and job ad)")]
    DetailsIncomplete,

    #[error("access token unavailable: {0}")]
    TokenUnavailable(String),

    #[error("job not found locally: {0}")]
    NotFoundLocally(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Whether this failure is expected to resolve on its own and therefore
    /// worth a bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EnrichmentPending(_) | Self::DetailsIncomplete | Self::TokenUnavailable(_)
        )
    }
}

pub struct WebhookProcessor {
    api: Arc<dyn RecruitingApi>,
    jobs: Arc<dyn JobStore>,
    activity: Arc<ActivityLog>,
    retry: Arc<RetryScheduler>,
}

impl WebhookProcessor {
    pub fn new(
        api: Arc<dyn RecruitingApi>,
        jobs: Arc<dyn JobStore>,
        activity: Arc<ActivityLog>,
        retry: Arc<RetryScheduler>,
    ) -> Self {
        Self {
            api,
            jobs,
            activity,
            retry,
        }
    }

    /// Dispatch one normalized event to completion. Never fails: outcomes,
    /// including hard failures, are absorbed into the activity log.
    pub async fn process(self: Arc<Self>, event: &NormalizedEvent) {
        let received_title = if event.title.is_empty() {
            "N/A"
        } else {
            event.title.as_str()
        };
        self.activity
            .record(
                &event.event_type,
                &event.external_id,
                received_title,
                ActivityStatus::Received,
                "",
                false,
            )
            .await;

        if let WebhookEventType::Unknown(raw) = &event.event_type {
            warn!(
                event_type = %raw,
                job_id = %event.external_id,
                "Unhandled webhook event type, defaulting to job sync"
            );
        }

        if event.event_type.is_delete() {
            self.dispatch_delete(event).await;
        } else {
            self.dispatch_upsert(event).await;
        }
    }

    async fn dispatch_upsert(self: Arc<Self>, event: &NormalizedEvent) {
        match self
            .sync_job(&event.external_id, &event.payload, event.self_link.as_deref())
            .await
        {
            Ok(title) => {
                info!(job_id = %event.external_id, event = %event.event_type, "Job sync successful");
                let resolved = if title.is_empty() { &event.title } else { &title };
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        resolved,
                        ActivityStatus::Success,
                        "",
                        true,
                    )
                    .await;
            }
            Err(e) if e.is_transient() => {
                debug!(job_id = %event.external_id, error = %e, "Job sync skipped");
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        &event.title,
                        ActivityStatus::Skipped,
                        &e.to_string(),
                        true,
                    )
                    .await;
                let retry = Arc::clone(&self.retry);
                retry.schedule_retry(&event.external_id, self).await;
            }
            Err(e) => {
                warn!(job_id = %event.external_id, error = %e, "Job sync failed");
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        &event.title,
                        ActivityStatus::Failed,
                        &e.to_string(),
                        true,
                    )
                    .await;
            }
        }
    }

    async fn dispatch_delete(self: Arc<Self>, event: &NormalizedEvent) {
        match self.delete_job(&event.external_id).await {
            Ok(title) => {
                info!(job_id = %event.external_id, "Job deleted");
                let resolved = if title.is_empty() { &event.title } else { &title };
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        resolved,
                        ActivityStatus::Deleted,
                        "",
                        true,
                    )
                    .await;
            }
            // Nothing to delete is a skip, not a failure
            Err(SyncError::NotFoundLocally(_)) => {
                debug!(job_id = %event.external_id, "No local record to delete");
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        &event.title,
                        ActivityStatus::Skipped,
                        "No local record for this job",
                        true,
                    )
                    .await;
            }
            Err(e) if e.is_transient() => {
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        &event.title,
                        ActivityStatus::Skipped,
                        &e.to_string(),
                        true,
                    )
                    .await;
                let retry = Arc::clone(&self.retry);
                retry.schedule_retry(&event.external_id, self).await;
            }
            Err(e) => {
                warn!(job_id = %event.external_id, error = %e, "Job delete failed");
                self.activity
                    .record(
                        &event.event_type,
                        &event.external_id,
                        &event.title,
                        ActivityStatus::DeleteFailed,
                        &e.to_string(),
                        true,
                    )
                    .await;
            }
        }
    }

    /// Upsert one job from an inbound payload: find by external id, enrich
    /// when the payload lacks detail fields, then update in place or create.
    async fn sync_job(
        &self,
        external_id: &str,
        payload: &Value,
        self_link: Option<&str>,
    ) -> Result<String, SyncError> {
        if external_id.trim().is_empty() {
            return Err(SyncError::MissingJobId);
        }

        let existing = self.jobs.find_by_external_id(external_id).await?;
        let detail = self.enrich(external_id, payload, self_link).await?;

        let mut record = map_job(&detail);
        if !record.has_external_id() {
            record.external_id = external_id.to_string();
        }

        match existing {
            Some(stored) => {
                self.jobs.update(stored.id, &record).await?;
                Ok(record.title)
            }
            None => {
                if record.title.is_empty() && record.job_ad_raw.is_null() {
                    return Err(SyncError::DetailsIncomplete);
                }
                self.jobs.insert(&record).await?;
                Ok(record.title)
            }
        }
    }

    /// Fetch full detail when the payload lacks it. The payload is complete
    /// enough as-is when it already carries a job ad, department or
    /// location.
    async fn enrich(
        &self,
        external_id: &str,
        payload: &Value,
        self_link: Option<&str>,
    ) -> Result<Value, SyncError> {
        if payload_has_detail(payload) {
            return Ok(payload.clone());
        }

        let token = self.api.access_token().await.map_err(|e| {
            let reason = match e {
                ApiClientError::Auth(reason) => reason,
                other => other.to_string(),
            };
            SyncError::TokenUnavailable(reason)
        })?;

        self.api
            .job_details(&token, external_id, self_link)
            .await
            .map_err(|e| SyncError::EnrichmentPending(e.to_string()))
    }

    /// Remove a job by external id, returning its title for the log.
    async fn delete_job(&self, external_id: &str) -> Result<String, SyncError> {
        if external_id.trim().is_empty() {
            return Err(SyncError::MissingJobId);
        }
        match self.jobs.delete_by_external_id(external_id).await? {
            Some(stored) => Ok(stored.record.title),
            None => Err(SyncError::NotFoundLocally(external_id.to_string())),
        }
    }
}

#[async_trait]
impl RetrySync for WebhookProcessor {
    async fn resync(&self, external_id: &str) -> Result<String, SyncError> {
        self.sync_job(external_id, &json!({ "id": external_id }), None)
            .await
    }
}

/// Whether an inbound payload already carries detail fields.
fn payload_has_detail(payload: &Value) -> bool {
    ["jobAd", "department", "location"]
        .iter()
        .any(|key| match &payload[*key] {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
}
