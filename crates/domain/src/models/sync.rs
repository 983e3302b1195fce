//! Bulk sync run models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options for a bulk reconcile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncOptions {
    /// Skip jobs whose status or posting status is CANCELLED/CANCELED.
    #[serde(default)]
    pub exclude_cancelled: bool,
}

/// Outcome of a bulk reconcile run: aggregate result plus a per-action
/// transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub logs: Vec<String>,
}

impl SyncReport {
    pub fn failure(message: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            logs,
        }
    }
}

/// The persisted summary of the most recent run, manual or scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LastRun {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub logs: Vec<String>,
    pub options: SyncOptions,
}

impl LastRun {
    pub fn from_report(report: &SyncReport, options: SyncOptions, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            success: report.success,
            message: report.message.clone(),
            logs: report.logs.clone(),
            options,
        }
    }
}
