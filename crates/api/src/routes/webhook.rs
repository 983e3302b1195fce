//! Inbound webhook endpoint.
//!
//! The transport half of webhook processing: method handling, the feature
//! gate, the activation handshake, body parsing, and signature
//! verification. Everything past that point is handed to the webhook
//! processor, whose outcome never changes the response: accepted deliveries
//! are answered 202 and failures surface asynchronously through the
//! activity log.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use domain::models::activity::ActivityStatus;
use domain::models::webhook::{
    extract_self_link, normalize, HeaderContext, NormalizeError, WebhookEventType,
};
use domain::store::state_keys;
use shared::signature::verify_signature;

use crate::app::AppState;

/// Handshake header: the secret must be persisted and echoed back.
pub const HOOK_SECRET_HEADER: &str = "x-hook-secret";
/// Signature header carrying `sha256=<hex hmac>` over the raw body.
pub const SIGNATURE_HEADER: &str = "x-smartrecruiters-signature";

const EVENT_NAME_HEADER: &str = "event-name";
const EVENT_VERSION_HEADER: &str = "event-version";
const EVENT_ID_HEADER: &str = "event-id";
const LINK_HEADER: &str = "link";

/// GET diagnostic so an operator can confirm the endpoint is reachable.
pub async fn probe() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Webhook endpoint is accessible"
    }))
}

/// POST delivery handler.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.config.webhook.enabled {
        debug!("Webhook delivery rejected: ingestion disabled");
        return (StatusCode::FORBIDDEN, "Webhooks disabled").into_response();
    }

    // Activation handshake takes precedence over everything in the body
    if let Some(secret) = header_value(&headers, HOOK_SECRET_HEADER) {
        return handshake(&state, &secret).await;
    }

    // Empty body with no handshake header is a keep-alive ping
    if body.is_empty() {
        debug!("Empty webhook request, treating as ping");
        return (StatusCode::OK, "OK").into_response();
    }

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    if let Some(rejection) = check_signature(&state, &headers, &body).await {
        return rejection;
    }

    let header_ctx = header_context(&headers);
    if let Some(event_id) = &header_ctx.event_id {
        debug!(event_id = %event_id, version = ?header_ctx.event_version, "Webhook delivery headers");
    }

    match normalize(&parsed, &header_ctx) {
        Ok(event) => {
            debug!(
                event_type = %event.event_type,
                job_id = %event.external_id,
                "Processing webhook event"
            );
            Arc::clone(&state.processor).process(&event).await;
        }
        Err(NormalizeError::MissingJobId { event_type }) => {
            warn!(event_type = %event_type, "Webhook payload carries no job id");
            state
                .activity
                .record(
                    &WebhookEventType::from_raw(&event_type),
                    "N/A",
                    "N/A",
                    ActivityStatus::Failed,
                    "No job ID found",
                    false,
                )
                .await;
        }
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

/// Persist the handshake secret as the verification key and echo it back.
async fn handshake(state: &AppState, secret: &str) -> Response {
    info!("Webhook handshake received");
    if let Err(e) = state
        .state
        .put(state_keys::WEBHOOK_SECRET, json!(secret))
        .await
    {
        warn!(error = %e, "Failed to persist webhook secret");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store secret").into_response();
    }

    let mut response = (StatusCode::OK, "OK").into_response();
    if let Ok(value) = HeaderValue::from_str(secret) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(HOOK_SECRET_HEADER), value);
    }
    response
}

/// Verify the delivery signature when a key is on record and a signature
/// header is present. A missing header is accepted; verification is
/// best-effort.
async fn check_signature(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Option<Response> {
    let secret = match state.state.get(state_keys::WEBHOOK_SECRET).await {
        Ok(Some(value)) => value.as_str().map(str::to_string),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read webhook secret");
            None
        }
    };
    let secret = secret?;
    let signature = header_value(headers, SIGNATURE_HEADER)?;

    if verify_signature(&secret, body, &signature) {
        debug!("Webhook signature verified");
        None
    } else {
        warn!("Webhook signature verification failed");
        Some((StatusCode::UNAUTHORIZED, "Invalid signature").into_response())
    }
}

fn header_context(headers: &HeaderMap) -> HeaderContext {
    HeaderContext {
        event_name: header_value(headers, EVENT_NAME_HEADER),
        event_version: header_value(headers, EVENT_VERSION_HEADER),
        event_id: header_value(headers, EVENT_ID_HEADER),
        self_link: header_value(headers, LINK_HEADER)
            .and_then(|link| extract_self_link(&link)),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_trims_and_filters() {
        let mut headers = HeaderMap::new();
        headers.insert("event-name", HeaderValue::from_static("  Job.Created  "));
        headers.insert("event-id", HeaderValue::from_static(""));
        assert_eq!(
            header_value(&headers, "event-name").as_deref(),
            Some("Job.Created")
        );
        assert_eq!(header_value(&headers, "event-id"), None);
        assert_eq!(header_value(&headers, "missing"), None);
    }

    #[test]
    fn test_header_context_extracts_self_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "link",
            HeaderValue::from_static("<https://api.example.com/jobs/a1b2>; rel=\"self\""),
        );
        let ctx = header_context(&headers);
        assert_eq!(
            ctx.self_link.as_deref(),
            Some("https://api.example.com/jobs/a1b2")
        );
    }
}
