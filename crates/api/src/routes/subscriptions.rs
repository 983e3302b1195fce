//! Webhook subscription management endpoints.
//!
//! Thin wrappers over the remote webhook-management API, plus bookkeeping
//! of which subscription id belongs to this deployment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use domain::store::state_keys;

use crate::app::AppState;
use crate::error::ApiError;

/// Placeholder id resolving to the stored subscription.
const CURRENT: &str = "current";

#[derive(Debug, serde::Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateSubscriptionRequest {
    #[validate(
        url(message = "Invalid URL format"),
        length(max = 2048, message = "URL must be at most 2048 characters")
    )]
    #[validate(custom(function = "validate_https_url"))]
    pub callback_url: String,
}

/// Custom validator for HTTPS URLs.
fn validate_https_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.starts_with("https://") {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("https_required");
        err.message = Some("URL must use HTTPS protocol".into());
        Err(err)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SubscriptionCreatedResponse {
    pub id: String,
    pub message: String,
}

/// Create a webhook subscription for this deployment's callback URL.
///
/// POST /api/v1/subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionCreatedResponse>), ApiError> {
    request.validate()?;

    let token = state.api.access_token().await?;
    let id = state
        .api
        .create_subscription(&token, &request.callback_url)
        .await?;

    state
        .state
        .put(state_keys::WEBHOOK_SUBSCRIPTION_ID, json!(id))
        .await?;

    info!(subscription_id = %id, "Webhook subscription created");
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionCreatedResponse {
            id,
            message: "Webhook subscription created. Activate it to start receiving events."
                .to_string(),
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SubscriptionListResponse {
    pub content: Vec<Value>,
}

/// List the remote webhook subscriptions.
///
/// GET /api/v1/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<SubscriptionListResponse>, ApiError> {
    let token = state.api.access_token().await?;
    let content = state.api.list_subscriptions(&token).await?;
    Ok(Json(SubscriptionListResponse { content }))
}

/// Delete a subscription. `current` resolves to the stored id; deleting the
/// stored subscription also clears the stored id and verification secret.
///
/// DELETE /api/v1/subscriptions/:id
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let stored_id = state
        .state
        .get(state_keys::WEBHOOK_SUBSCRIPTION_ID)
        .await?
        .and_then(|value| value.as_str().map(str::to_string));

    let target = if id == CURRENT {
        stored_id
            .clone()
            .ok_or_else(|| ApiError::NotFound("No webhook subscription found".to_string()))?
    } else {
        id
    };

    let token = state.api.access_token().await?;
    state.api.delete_subscription(&token, &target).await?;

    if stored_id.as_deref() == Some(target.as_str()) {
        state.state.delete(state_keys::WEBHOOK_SUBSCRIPTION_ID).await?;
        state.state.delete(state_keys::WEBHOOK_SECRET).await?;
    }

    info!(subscription_id = %target, "Webhook subscription deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Activate a subscription so the remote system starts delivering.
///
/// PUT /api/v1/subscriptions/:id/activation
pub async fn activate_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token = state.api.access_token().await?;
    state.api.activate_subscription(&token, &id).await?;
    info!(subscription_id = %id, "Webhook subscription activated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_https() {
        let request = CreateSubscriptionRequest {
            callback_url: "http://example.com/webhooks".to_string(),
        };
        assert!(request.validate().is_err());

        let request = CreateSubscriptionRequest {
            callback_url: "https://example.com/webhooks".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_non_url() {
        let request = CreateSubscriptionRequest {
            callback_url: "not a url".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
