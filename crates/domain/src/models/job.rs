//! Job record domain model.
//!
//! `JobRecord` is the canonical local representation of one remote job.
//! Every descriptive field defaults to an empty string when the remote
//! payload omits it; raw captures default to JSON `null`. The remote job id
//! (`external_id`) is the sole reconciliation key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One section of a job ad (company description, qualifications, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobAdSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// One custom property flattened out of the remote `properties[]` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobProperty {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub id: String,
    /// The original property object as received.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// The canonical local representation of one remote job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobRecord {
    /// The remote system's stable job identifier. Unique across the store;
    /// a record without one must never be created.
    pub external_id: String,

    // Descriptive fields
    pub title: String,
    pub ref_number: String,
    pub status: String,
    pub posting_status: String,
    pub department: String,
    pub language: String,
    pub experience_level: String,
    pub experience_level_raw: serde_json::Value,
    pub employment_type: String,

    // Location
    pub location_display: String,
    pub city: String,
    pub country_code: String,
    pub region_code: String,
    pub postal_code: String,
    /// `"REMOTE"` or `"ONSITE"`.
    pub remote: String,
    pub location_raw: serde_json::Value,

    // Content
    /// Composed HTML description for display.
    pub description: String,
    pub job_ad_raw: serde_json::Value,
    pub company_description: JobAdSection,
    pub job_description: JobAdSection,
    pub qualifications: JobAdSection,
    pub additional_information: JobAdSection,
    pub video_urls: Vec<String>,

    // Action URLs
    pub actions_raw: serde_json::Value,
    /// Canonical API detail URL (`actions.details.url`).
    pub details_url: String,
    /// Public apply URL synthesized from the reference number.
    pub apply_url: String,
    /// `actions.applyOnWeb.url` when present.
    pub apply_on_web_url: String,

    // Extensibility: flattened custom properties, keyed by sanitized key.
    pub properties: BTreeMap<String, JobProperty>,
    pub properties_raw: serde_json::Value,
    /// Label of the distinguished `Partners` property.
    pub partners: String,

    // Provenance from the remote system
    pub summary_raw: serde_json::Value,
    pub created_on: String,
    pub updated_on: String,
    pub last_activity_on: String,
    pub target_hiring_date: String,
}

impl JobRecord {
    /// Whether the record carries a usable reconciliation key.
    pub fn has_external_id(&self) -> bool {
        !self.external_id.trim().is_empty()
    }
}

/// A job record as held by the store, with its local identity and sync audit
/// fields. Local ids are assigned by storage on creation and are not stable
/// across bulk reconciles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoredJob {
    pub id: i64,
    pub record: JobRecord,
    pub last_synced_at: DateTime<Utc>,
    pub sync_status: String,
}
