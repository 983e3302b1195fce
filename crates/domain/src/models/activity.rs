//! Webhook activity log model.
//!
//! A bounded, newest-first list of sync/webhook events kept for
//! observability. A `received` entry is resolved in place once the outcome
//! of the same (event type, job id) pair is known, so one delivery shows up
//! as a single row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of retained entries; the oldest are evicted first.
pub const ACTIVITY_LOG_CAPACITY: usize = 50;

/// Outcome tag of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Received,
    Success,
    Failed,
    Deleted,
    DeleteFailed,
    Skipped,
    UnknownEvent,
}

impl ActivityStatus {
    /// Human-readable label for admin display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Deleted => "Deleted",
            Self::DeleteFailed => "Delete Failed",
            Self::Skipped => "Skipped",
            Self::UnknownEvent => "Unknown Event",
        }
    }
}

/// One row of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event_label: String,
    pub job_id: String,
    pub job_title: String,
    pub status: ActivityStatus,
    pub status_label: String,
    #[serde(default)]
    pub details: String,
}

/// Record an event into `entries` (newest first).
///
/// With `update_existing` set, a still-`received` entry for the same
/// (event type, job id) is mutated in place instead of appending a second
/// row. Otherwise the entry is prepended and the list truncated to
/// [`ACTIVITY_LOG_CAPACITY`].
#[allow(clippy::too_many_arguments)]
pub fn record_entry(
    entries: &mut Vec<ActivityLogEntry>,
    now: DateTime<Utc>,
    event_type: &str,
    event_label: &str,
    job_id: &str,
    job_title: &str,
    status: ActivityStatus,
    details: &str,
    update_existing: bool,
) {
    if update_existing {
        if let Some(existing) = entries.iter_mut().find(|entry| {
            entry.event_type == event_type
                && entry.job_id == job_id
                && entry.status == ActivityStatus::Received
        }) {
            existing.status = status;
            existing.status_label = status.label().to_string();
            if !job_title.is_empty() && job_title != "N/A" {
                existing.job_title = job_title.to_string();
            }
            if !details.is_empty() {
                existing.details = details.to_string();
            }
            existing.timestamp = now;
            return;
        }
    }

    entries.insert(
        0,
        ActivityLogEntry {
            timestamp: now,
            event_type: event_type.to_string(),
            event_label: event_label.to_string(),
            job_id: job_id.to_string(),
            job_title: job_title.to_string(),
            status,
            status_label: status.label().to_string(),
            details: details.to_string(),
        },
    );
    entries.truncate(ACTIVITY_LOG_CAPACITY);
}
