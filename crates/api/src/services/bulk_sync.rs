//! Bulk pull-sync reconciliation.
//!
//! The bulk path mirrors the remote system rather than merging with it:
//! fetch the complete paginated job list, then wipe the local store and
//! recreate every surviving job from its full detail. The wipe only runs
//! once the token and the job list are in hand, so a failed fetch can never
//! leave the store empty. Per-job detail failures are non-fatal and fall
//! back to the summary payload.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use domain::models::sync::{LastRun, SyncOptions, SyncReport};
use domain::services::mapper::map_job;
use domain::store::{state_keys, JobStore, StateStore};

use crate::services::smartrecruiters::RecruitingApi;

pub struct BulkSyncService {
    api: Arc<dyn RecruitingApi>,
    jobs: Arc<dyn JobStore>,
    state: Arc<dyn StateStore>,
}

impl BulkSyncService {
    pub fn new(
        api: Arc<dyn RecruitingApi>,
        jobs: Arc<dyn JobStore>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self { api, jobs, state }
    }

    /// Run a full reconcile and persist the outcome as the last-run summary.
    /// Always returns a report; failures are carried inside it.
    pub async fn reconcile(&self, options: SyncOptions) -> SyncReport {
        info!(exclude_cancelled = options.exclude_cancelled, "Starting bulk sync");
        let report = self.run(options).await;
        if report.success {
            info!(message = %report.message, "Bulk sync completed");
        } else {
            error!(message = %report.message, "Bulk sync failed");
        }

        let last_run = LastRun::from_report(&report, options, Utc::now());
        match serde_json::to_value(&last_run) {
            Ok(value) => {
                if let Err(e) = self.state.put(state_keys::LAST_RUN, value).await {
                    warn!(error = %e, "Failed to persist last-run summary");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize last-run summary"),
        }

        report
    }

    async fn run(&self, options: SyncOptions) -> SyncReport {
        let mut logs = Vec::new();

        // Fail fast before anything destructive
        let token = match self.api.access_token().await {
            Ok(token) => token,
            Err(e) => {
                return SyncReport::failure(format!("Sync failed: {e}"), logs);
            }
        };

        if options.exclude_cancelled {
            logs.push("Excluding cancelled jobs from this run.".to_string());
        }

        let summaries = match self.api.list_jobs(&token).await {
            Ok(summaries) => summaries,
            Err(e) => {
                logs.push(format!("Jobs list fetch failed: {e}"));
                return SyncReport::failure(format!("Sync failed: {e}"), logs);
            }
        };
        logs.push(format!("Fetched {} jobs from remote API", summaries.len()));

        // Mirror, not merge: drop everything, then repopulate
        let removed = match self.jobs.delete_all().await {
            Ok(removed) => removed,
            Err(e) => {
                return SyncReport::failure(format!("Sync failed: {e}"), logs);
            }
        };
        logs.push(format!("Removed {removed} existing job records"));

        let mut added = 0usize;
        for summary in &summaries {
            let Some(external_id) = summary_id(summary) else {
                continue;
            };
            let display = summary["title"].as_str().unwrap_or(&external_id);

            if options.exclude_cancelled && is_cancelled(summary) {
                logs.push(format!("Skipped cancelled job: {display} ({external_id})"));
                continue;
            }

            logs.push(format!("Fetching job details: {external_id}"));
            let detail = match self.api.job_details(&token, &external_id, None).await {
                Ok(detail) => detail,
                Err(e) => {
                    // Summary-only record beats no record
                    logs.push(format!(
                        "Job details unavailable for {external_id}: {e}; using summary"
                    ));
                    summary.clone()
                }
            };

            // Status may have changed between the list and the detail fetch
            if options.exclude_cancelled && is_cancelled(&detail) {
                let display = detail["title"].as_str().unwrap_or(&external_id);
                logs.push(format!(
                    "Skipped cancelled job after details fetch: {display} ({external_id})"
                ));
                continue;
            }

            let mut record = map_job(&detail);
            record.summary_raw = summary.clone();
            if !record.has_external_id() {
                record.external_id = external_id.clone();
            }

            match self.jobs.insert(&record).await {
                Ok(_) => {
                    added += 1;
                    let title = if record.title.is_empty() {
                        external_id.as_str()
                    } else {
                        record.title.as_str()
                    };
                    logs.push(format!("Synced job: {title} ({external_id})"));
                }
                Err(e) => {
                    warn!(job_id = %external_id, error = %e, "Failed to store job");
                    logs.push(format!("Failed to store job {external_id}: {e}"));
                }
            }
        }

        SyncReport {
            success: true,
            message: format!("Sync completed: {added} jobs refreshed with details"),
            logs,
        }
    }
}

fn summary_id(summary: &Value) -> Option<String> {
    match &summary["id"] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Case-insensitive CANCELLED/CANCELED check on both status fields.
fn is_cancelled(job: &Value) -> bool {
    [&job["status"], &job["postingStatus"]].iter().any(|value| {
        value
            .as_str()
            .map(|s| {
                let status = s.to_uppercase();
                status == "CANCELLED" || status == "CANCELED"
            })
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::smartrecruiters::ApiClientError;
    use async_trait::async_trait;
    use domain::models::job::JobRecord;
    use persistence::memory::{InMemoryJobStore, InMemoryStateStore};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubApi {
        fail_token: bool,
        fail_list: bool,
        summaries: Vec<Value>,
        details: Mutex<HashMap<String, Value>>,
    }

    #[async_trait]
    impl RecruitingApi for StubApi {
        async fn access_token(&self) -> Result<String, ApiClientError> {
            if self.fail_token {
                Err(ApiClientError::Auth("API configuration incomplete".into()))
            } else {
                Ok("test-token".to_string())
            }
        }

        async fn list_jobs(&self, _token: &str) -> Result<Vec<Value>, ApiClientError> {
            if self.fail_list {
                Err(ApiClientError::Transport("connection refused".into()))
            } else {
                Ok(self.summaries.clone())
            }
        }

        async fn job_details(
            &self,
            _token: &str,
            external_id: &str,
            _self_link: Option<&str>,
        ) -> Result<Value, ApiClientError> {
            self.details
                .lock()
                .unwrap()
                .get(external_id)
                .cloned()
                .ok_or(ApiClientError::Status {
                    status: 404,
                    body: String::new(),
                })
        }

        async fn create_subscription(
            &self,
            _token: &str,
            _callback_url: &str,
        ) -> Result<String, ApiClientError> {
            Ok("sub-1".to_string())
        }

        async fn list_subscriptions(&self, _token: &str) -> Result<Vec<Value>, ApiClientError> {
            Ok(Vec::new())
        }

        async fn delete_subscription(&self, _token: &str, _id: &str) -> Result<(), ApiClientError> {
            Ok(())
        }

        async fn activate_subscription(
            &self,
            _token: &str,
            _id: &str,
        ) -> Result<(), ApiClientError> {
            Ok(())
        }
    }

    struct Harness {
        service: BulkSyncService,
        jobs: Arc<InMemoryJobStore>,
        state: Arc<InMemoryStateStore>,
    }

    fn harness(api: StubApi) -> Harness {
        let jobs = Arc::new(InMemoryJobStore::new());
        let state = Arc::new(InMemoryStateStore::new());
        let service = BulkSyncService::new(
            Arc::new(api),
            jobs.clone() as Arc<dyn JobStore>,
            state.clone() as Arc<dyn StateStore>,
        );
        Harness { service, jobs, state }
    }

    async fn seed_job(jobs: &InMemoryJobStore, external_id: &str) {
        jobs.insert(&JobRecord {
            external_id: external_id.to_string(),
            title: "Existing".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_token_failure_aborts_before_wipe() {
        let h = harness(StubApi {
            fail_token: true,
            ..Default::default()
        });
        seed_job(&h.jobs, "KEEP").await;

        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(!report.success);
        assert!(report.message.contains("access token unavailable"));
        // The existing record survived
        assert_eq!(h.jobs.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_aborts_before_wipe() {
        let h = harness(StubApi {
            fail_list: true,
            ..Default::default()
        });
        seed_job(&h.jobs, "KEEP").await;

        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(!report.success);
        assert_eq!(h.jobs.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_replace_with_details() {
        let api = StubApi {
            summaries: vec![json!({"id": "J1", "title": "Engineer", "status": "ACTIVE"})],
            ..Default::default()
        };
        api.details.lock().unwrap().insert(
            "J1".to_string(),
            json!({
                "id": "J1",
                "title": "Engineer",
                "status": "ACTIVE",
                "department": {"label": "Platform"}
            }),
        );
        let h = harness(api);
        seed_job(&h.jobs, "STALE").await;

        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(report.success);
        assert!(report.message.contains("1 jobs refreshed"));

        // Old record gone, new one mapped from the detail payload
        assert!(h.jobs.find_by_external_id("STALE").await.unwrap().is_none());
        let stored = h.jobs.find_by_external_id("J1").await.unwrap().unwrap();
        assert_eq!(stored.record.department, "Platform");
        assert_eq!(stored.record.summary_raw["title"], "Engineer");
    }

    #[tokio::test]
    async fn test_detail_failure_falls_back_to_summary() {
        let h = harness(StubApi {
            summaries: vec![json!({"id": "J1", "title": "Engineer", "status": "ACTIVE"})],
            ..Default::default()
        });

        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(report.success);
        let stored = h.jobs.find_by_external_id("J1").await.unwrap().unwrap();
        assert_eq!(stored.record.title, "Engineer");
        assert!(report
            .logs
            .iter()
            .any(|line| line.contains("using summary")));
    }

    #[tokio::test]
    async fn test_exclude_cancelled_at_summary_stage() {
        let h = harness(StubApi {
            summaries: vec![
                json!({"id": "J1", "title": "Cancelled", "status": "CANCELLED"}),
                json!({"id": "J2", "title": "Active", "status": "ACTIVE"}),
            ],
            ..Default::default()
        });

        let report = h
            .service
            .reconcile(SyncOptions {
                exclude_cancelled: true,
            })
            .await;
        assert!(report.success);
        assert!(h.jobs.find_by_external_id("J1").await.unwrap().is_none());
        assert!(h.jobs.find_by_external_id("J2").await.unwrap().is_some());
        assert!(report
            .logs
            .iter()
            .any(|line| line.contains("Skipped cancelled job: Cancelled (J1)")));
    }

    #[tokio::test]
    async fn test_exclude_cancelled_after_detail_fetch() {
        // Active in the list, cancelled by the time the detail is fetched
        let api = StubApi {
            summaries: vec![json!({"id": "J1", "title": "Flapper", "status": "ACTIVE"})],
            ..Default::default()
        };
        api.details.lock().unwrap().insert(
            "J1".to_string(),
            json!({"id": "J1", "title": "Flapper", "postingStatus": "CANCELED"}),
        );
        let h = harness(api);

        let report = h
            .service
            .reconcile(SyncOptions {
                exclude_cancelled: true,
            })
            .await;
        assert!(report.success);
        assert_eq!(h.jobs.count().await.unwrap(), 0);
        assert!(report
            .logs
            .iter()
            .any(|line| line.contains("after details fetch")));
    }

    #[tokio::test]
    async fn test_cancelled_kept_when_not_excluded() {
        let h = harness(StubApi {
            summaries: vec![json!({"id": "J1", "title": "Cancelled", "status": "CANCELLED"})],
            ..Default::default()
        });

        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(report.success);
        assert_eq!(h.jobs.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_run_is_persisted() {
        let h = harness(StubApi::default());
        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(report.success);

        let value = h.state.get(state_keys::LAST_RUN).await.unwrap().unwrap();
        let last_run: LastRun = serde_json::from_value(value).unwrap();
        assert!(last_run.success);
        assert_eq!(last_run.message, report.message);
    }

    #[tokio::test]
    async fn test_summary_without_id_is_skipped() {
        let h = harness(StubApi {
            summaries: vec![json!({"title": "No id"})],
            ..Default::default()
        });
        let report = h.service.reconcile(SyncOptions::default()).await;
        assert!(report.success);
        assert_eq!(h.jobs.count().await.unwrap(), 0);
    }

    #[test]
    fn test_is_cancelled_variants() {
        assert!(is_cancelled(&json!({"status": "CANCELLED"})));
        assert!(is_cancelled(&json!({"status": "cancelled"})));
        assert!(is_cancelled(&json!({"postingStatus": "Canceled"})));
        assert!(!is_cancelled(&json!({"status": "ACTIVE"})));
        assert!(!is_cancelled(&json!({})));
    }
}
