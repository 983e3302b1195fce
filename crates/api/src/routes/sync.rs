//! Manual sync trigger and inspection endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;

use domain::models::activity::ActivityLogEntry;
use domain::models::sync::{LastRun, SyncOptions, SyncReport};
use domain::store::state_keys;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggerSyncRequest {
    /// Overrides the configured default when present.
    pub exclude_cancelled: Option<bool>,
}

/// Run a bulk reconcile now.
///
/// POST /api/v1/sync
///
/// Returns the aggregate result plus the full log transcript; the same
/// structure is persisted as the last-run summary.
pub async fn trigger_sync(
    State(state): State<AppState>,
    body: Option<Json<TriggerSyncRequest>>,
) -> Json<SyncReport> {
    let exclude_cancelled = body
        .and_then(|Json(request)| request.exclude_cancelled)
        .unwrap_or(state.config.sync.exclude_cancelled);

    let report = state
        .bulk_sync
        .reconcile(SyncOptions { exclude_cancelled })
        .await;
    Json(report)
}

/// The persisted summary of the most recent run.
///
/// GET /api/v1/sync/last-run
pub async fn last_run(State(state): State<AppState>) -> Result<Json<LastRun>, ApiError> {
    let value = state
        .state
        .get(state_keys::LAST_RUN)
        .await?
        .ok_or_else(|| ApiError::NotFound("No runs recorded yet".to_string()))?;
    let last_run: LastRun = serde_json::from_value(value)
        .map_err(|e| ApiError::Internal(format!("Corrupt last-run state: {e}")))?;
    Ok(Json(last_run))
}

/// The webhook activity log, newest first.
///
/// GET /api/v1/activity
pub async fn activity_log(State(state): State<AppState>) -> Json<Vec<ActivityLogEntry>> {
    Json(state.activity.entries().await)
}
