//! Webhook event normalization.
//!
//! Inbound notifications arrive in several shapes depending on the remote
//! event family and API revision: the job payload may sit under `data`, one
//! of several fallback keys, or at the top level; the event type and job id
//! may live in the body or only in delivery headers. Normalization flattens
//! all of that into a [`NormalizedEvent`] with a guaranteed job id, or
//! reports that no id was resolvable.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Body keys probed for the job payload when `data` is absent or empty.
const PAYLOAD_KEYS: [&str; 5] = ["job", "position", "object", "payload", "entity"];

lazy_static! {
    static ref SELF_LINK_RE: Regex =
        Regex::new(r#"(?i)<([^>]+)>;\s*rel="?self"?"#).expect("self link regex");
    static ref ANY_LINK_RE: Regex = Regex::new(r"<([^>]+)>").expect("any link regex");
    static ref JOB_ID_FROM_LINK_RE: Regex =
        Regex::new(r"(?i)/jobs/([a-f0-9-]+)").expect("job id regex");
}

/// Normalized webhook event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    JobCreated,
    JobUpdated,
    JobStatusUpdated,
    JobDeleted,
    PositionCreated,
    PositionUpdated,
    PositionDeleted,
    JobRetry,
    Unknown(String),
}

impl WebhookEventType {
    /// Parse a raw event-type string (case-insensitive).
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "job.created" => Self::JobCreated,
            "job.updated" => Self::JobUpdated,
            "job.status.updated" => Self::JobStatusUpdated,
            "job.deleted" => Self::JobDeleted,
            "position.created" => Self::PositionCreated,
            "position.updated" => Self::PositionUpdated,
            "position.deleted" => Self::PositionDeleted,
            "job.retry" => Self::JobRetry,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire-format event name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::JobCreated => "job.created",
            Self::JobUpdated => "job.updated",
            Self::JobStatusUpdated => "job.status.updated",
            Self::JobDeleted => "job.deleted",
            Self::PositionCreated => "position.created",
            Self::PositionUpdated => "position.updated",
            Self::PositionDeleted => "position.deleted",
            Self::JobRetry => "job.retry",
            Self::Unknown(raw) => raw,
        }
    }

    /// Human-readable label for the activity log.
    pub fn label(&self) -> String {
        match self {
            Self::JobCreated => "Job Created".to_string(),
            Self::JobUpdated => "Job Updated".to_string(),
            Self::JobStatusUpdated => "Job Status Updated".to_string(),
            Self::JobDeleted => "Job Deleted".to_string(),
            Self::PositionCreated => "Position Created".to_string(),
            Self::PositionUpdated => "Position Updated".to_string(),
            Self::PositionDeleted => "Position Deleted".to_string(),
            Self::JobRetry => "Job Retry Sync".to_string(),
            Self::Unknown(raw) => raw.clone(),
        }
    }

    /// Whether this event removes the local record.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::PositionDeleted | Self::JobDeleted)
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event metadata carried in delivery headers, used to backfill body fields.
#[derive(Debug, Clone, Default)]
pub struct HeaderContext {
    pub event_name: Option<String>,
    pub event_version: Option<String>,
    pub event_id: Option<String>,
    /// The `rel="self"` target extracted from the `Link` header.
    pub self_link: Option<String>,
}

/// A webhook notification reduced to its job-centric essentials.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event_type: WebhookEventType,
    pub external_id: String,
    /// Best-effort title; empty when the payload carries none.
    pub title: String,
    /// The job payload with the resolved id injected under `id`.
    pub payload: Value,
    pub self_link: Option<String>,
}

/// Normalization failure.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("no job id resolvable from webhook payload (event: {event_type})")]
    MissingJobId { event_type: String },
}

/// Extract the `rel="self"` target from a `Link` header value.
///
/// Falls back to the first `<...>` target when no part carries `rel="self"`.
pub fn extract_self_link(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        if let Some(caps) = SELF_LINK_RE.captures(part.trim()) {
            return Some(caps[1].to_string());
        }
    }
    ANY_LINK_RE
        .captures(link_header)
        .map(|caps| caps[1].to_string())
}

/// Normalize a decoded webhook body plus delivery headers into an event.
pub fn normalize(body: &Value, headers: &HeaderContext) -> Result<NormalizedEvent, NormalizeError> {
    let payload = extract_payload(body);

    let raw_event_type = non_empty_str(&body["eventType"])
        .or_else(|| non_empty_str(&body["event_type"]))
        .or_else(|| non_empty_str(&body["type"]))
        .map(str::to_string)
        .or_else(|| headers.event_name.as_deref().map(|s| s.trim().to_lowercase()));

    let self_link = headers
        .self_link
        .clone()
        .or_else(|| non_empty_str(&payload["_link"]).map(str::to_string));

    let external_id = resolve_job_id(body, &payload, self_link.as_deref());

    let Some(external_id) = external_id else {
        return Err(NormalizeError::MissingJobId {
            event_type: raw_event_type.unwrap_or_else(|| "unknown".to_string()),
        });
    };

    // An id with no event type is treated optimistically as an update.
    let event_type = match raw_event_type {
        Some(raw) => WebhookEventType::from_raw(&raw),
        None => WebhookEventType::JobUpdated,
    };

    let title = resolve_title(body, &payload);

    let mut payload = payload;
    if let Value::Object(map) = &mut payload {
        map.insert("id".to_string(), Value::String(external_id.clone()));
        map.remove("_link");
    }

    Ok(NormalizedEvent {
        event_type,
        external_id,
        title,
        payload,
        self_link,
    })
}

/// Pick the job payload out of the body: `data`, then the fallback keys,
/// then the whole body.
fn extract_payload(body: &Value) -> Value {
    if is_non_empty_object(&body["data"]) {
        return body["data"].clone();
    }
    for key in PAYLOAD_KEYS {
        if is_non_empty_object(&body[key]) {
            return body[key].clone();
        }
    }
    body.clone()
}

/// Probe the ordered id candidate paths, then fall back to the self link.
fn resolve_job_id(body: &Value, payload: &Value, self_link: Option<&str>) -> Option<String> {
    let candidates = [
        &payload["id"],
        &payload["jobId"],
        &payload["job_id"],
        &payload["jobUid"],
        &payload["jobUUID"],
        &body["job_id"],
        &body["jobId"],
        &payload["job"]["id"],
        &payload["job"]["jobId"],
        &payload["position"]["job"]["id"],
        &body["position"]["job"]["id"],
    ];

    for candidate in candidates {
        if let Some(id) = scalar_to_string(candidate) {
            return Some(id);
        }
    }

    self_link.and_then(|link| {
        JOB_ID_FROM_LINK_RE
            .captures(link)
            .map(|caps| caps[1].to_string())
    })
}

fn resolve_title(body: &Value, payload: &Value) -> String {
    let candidates = [
        &payload["title"],
        &payload["name"],
        &payload["job"]["title"],
        &body["job"]["title"],
    ];
    for candidate in candidates {
        if let Some(title) = non_empty_str(candidate) {
            return title.to_string();
        }
    }
    String::new()
}

fn is_non_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|map| !map.is_empty())
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

/// A non-empty string or a number, rendered as a string.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_from_raw() {
        assert_eq!(
            WebhookEventType::from_raw("job.created"),
            WebhookEventType::JobCreated
        );
        assert_eq!(
            WebhookEventType::from_raw("JOB.STATUS.UPDATED"),
            WebhookEventType::JobStatusUpdated
        );
        assert_eq!(
            WebhookEventType::from_raw(" position.deleted "),
            WebhookEventType::PositionDeleted
        );
        assert_eq!(
            WebhookEventType::from_raw("candidate.hired"),
            WebhookEventType::Unknown("candidate.hired".to_string())
        );
    }

    #[test]
    fn test_event_type_is_delete() {
        assert!(WebhookEventType::PositionDeleted.is_delete());
        assert!(WebhookEventType::JobDeleted.is_delete());
        assert!(!WebhookEventType::JobCreated.is_delete());
        assert!(!WebhookEventType::Unknown("x".into()).is_delete());
    }

    #[test]
    fn test_normalize_data_payload() {
        let body = json!({
            "eventType": "job.created",
            "data": {"id": "J1", "title": "Engineer"}
        });
        let event = normalize(&body, &HeaderContext::default()).unwrap();
        assert_eq!(event.event_type, WebhookEventType::JobCreated);
        assert_eq!(event.external_id, "J1");
        assert_eq!(event.title, "Engineer");
        assert_eq!(event.payload["id"], "J1");
    }

    #[test]
    fn test_normalize_fallback_payload_keys() {
        for key in ["job", "position", "object", "payload", "entity"] {
            let body = json!({
                "eventType": "job.updated",
                key: {"id": "J2", "title": "Nurse"}
            });
            let event = normalize(&body, &HeaderContext::default()).unwrap();
            assert_eq!(event.external_id, "J2", "payload key {key}");
        }
    }

    #[test]
    fn test_normalize_top_level_payload() {
        let body = json!({"eventType": "job.updated", "id": "J3", "title": "Chef"});
        let event = normalize(&body, &HeaderContext::default()).unwrap();
        assert_eq!(event.external_id, "J3");
        assert_eq!(event.title, "Chef");
    }

    #[test]
    fn test_normalize_nested_position_job_id() {
        let body = json!({
            "eventType": "position.created",
            "data": {"position": {"job": {"id": "J4"}}}
        });
        let event = normalize(&body, &HeaderContext::default()).unwrap();
        assert_eq!(event.external_id, "J4");
        assert_eq!(event.payload["id"], "J4");
    }

    #[test]
    fn test_normalize_id_from_link_header() {
        let headers = HeaderContext {
            self_link: extract_self_link(
                "<https://api.smartrecruiters.com/jobs/743c8a10-93e5>; rel=\"self\"",
            ),
            ..Default::default()
        };
        let body = json!({"eventType": "job.updated"});
        let event = normalize(&body, &headers).unwrap();
        assert_eq!(event.external_id, "743c8a10-93e5");
        assert_eq!(
            event.self_link.as_deref(),
            Some("https://api.smartrecruiters.com/jobs/743c8a10-93e5")
        );
    }

    #[test]
    fn test_normalize_event_type_from_header() {
        let headers = HeaderContext {
            event_name: Some("Job.Created".to_string()),
            ..Default::default()
        };
        let body = json!({"data": {"id": "J5"}});
        let event = normalize(&body, &headers).unwrap();
        assert_eq!(event.event_type, WebhookEventType::JobCreated);
    }

    #[test]
    fn test_normalize_defaults_to_update_without_event_type() {
        let body = json!({"data": {"id": "J6"}});
        let event = normalize(&body, &HeaderContext::default()).unwrap();
        assert_eq!(event.event_type, WebhookEventType::JobUpdated);
    }

    #[test]
    fn test_normalize_missing_id_rejected() {
        let body = json!({"eventType": "job.updated", "data": {"title": "No id"}});
        let err = normalize(&body, &HeaderContext::default()).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingJobId { .. }));
    }

    #[test]
    fn test_normalize_numeric_id() {
        let body = json!({"eventType": "job.updated", "data": {"id": 12345}});
        let event = normalize(&body, &HeaderContext::default()).unwrap();
        assert_eq!(event.external_id, "12345");
    }

    #[test]
    fn test_extract_self_link_variants() {
        assert_eq!(
            extract_self_link("<https://x/jobs/a1>; rel=\"self\"").as_deref(),
            Some("https://x/jobs/a1")
        );
        assert_eq!(
            extract_self_link("<https://x/other>; rel=\"next\", <https://x/jobs/a1>; rel=self")
                .as_deref(),
            Some("https://x/jobs/a1")
        );
        // No rel=self: first target wins
        assert_eq!(
            extract_self_link("<https://x/first>; rel=\"next\"").as_deref(),
            Some("https://x/first")
        );
        assert_eq!(extract_self_link("no links here"), None);
    }

    #[test]
    fn test_normalize_strips_link_key_from_payload() {
        let body = json!({
            "eventType": "job.updated",
            "data": {"id": "J7", "_link": "https://x/jobs/J7"}
        });
        let event = normalize(&body, &HeaderContext::default()).unwrap();
        assert!(event.payload.get("_link").is_none());
        assert_eq!(event.self_link.as_deref(), Some("https://x/jobs/J7"));
    }
}
