//! SmartRecruiters HTTP API client.
//!
//! Thin authenticated wrappers over the remote job and webhook-management
//! APIs. No retries happen at this layer: every failure surfaces to the
//! caller as a distinct [`ApiClientError`], and the sync services decide
//! what is fatal and what is transient.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::SmartRecruitersConfig;

/// Path of the webhook-subscription management API.
const SUBSCRIPTIONS_PATH: &str = "/webhooks-api/v201907/subscriptions";

/// Event types our subscription asks the remote system to deliver.
pub const SUBSCRIBED_EVENTS: [&str; 6] = [
    "job.created",
    "job.updated",
    "job.status.updated",
    "position.created",
    "position.updated",
    "position.deleted",
];

/// Errors surfaced by the API client.
#[derive(Error, Debug)]
pub enum ApiClientError {
    /// The token endpoint failed or the credentials are incomplete.
    #[error("access token unavailable: {0}")]
    Auth(String),

    /// The remote API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never completed (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body was not the JSON we expected.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// The remote recruiting API as consumed by the sync engine. The seam lets
/// tests substitute a scripted remote.
#[async_trait]
pub trait RecruitingApi: Send + Sync {
    /// Obtain an OAuth2 client-credentials token.
    async fn access_token(&self) -> Result<String, ApiClientError>;

    /// Fetch the complete job list, following pagination to the end.
    async fn list_jobs(&self, token: &str) -> Result<Vec<Value>, ApiClientError>;

    /// Fetch one job's full detail, preferring a canonical self link over a
    /// constructed URL.
    async fn job_details(
        &self,
        token: &str,
        external_id: &str,
        self_link: Option<&str>,
    ) -> Result<Value, ApiClientError>;

    /// Create a webhook subscription; returns the new subscription id.
    async fn create_subscription(
        &self,
        token: &str,
        callback_url: &str,
    ) -> Result<String, ApiClientError>;

    async fn list_subscriptions(&self, token: &str) -> Result<Vec<Value>, ApiClientError>;

    async fn delete_subscription(&self, token: &str, id: &str) -> Result<(), ApiClientError>;

    async fn activate_subscription(&self, token: &str, id: &str) -> Result<(), ApiClientError>;
}

/// Production client backed by reqwest.
pub struct SmartRecruitersClient {
    http: Client,
    config: SmartRecruitersConfig,
}

impl SmartRecruitersClient {
    pub fn new(config: SmartRecruitersConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { http, config }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    async fn get_json(&self, token: &str, url: &str) -> Result<Value, ApiClientError> {
        debug!(url = %url, "GET remote API");
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(ApiClientError::Status { status, body });
        }
        serde_json::from_str(&body).map_err(|e| ApiClientError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RecruitingApi for SmartRecruitersClient {
    async fn access_token(&self) -> Result<String, ApiClientError> {
        if !self.config.is_configured() {
            return Err(ApiClientError::Auth(
                "API configuration incomplete".to_string(),
            ));
        }

        let token_url = format!("{}/identity/oauth/token", self.base_url());
        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiClientError::Auth(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ApiClientError::Auth(format!("token endpoint HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiClientError::Auth(e.to_string()))?;
        token_from_response(&body)
            .map(str::to_string)
            .ok_or_else(|| ApiClientError::Auth("response missing access_token".to_string()))
    }

    async fn list_jobs(&self, token: &str) -> Result<Vec<Value>, ApiClientError> {
        let limit = self.config.page_size;
        let mut offset = 0;
        let mut all_jobs = Vec::new();

        loop {
            let url = format!("{}/jobs?limit={limit}&offset={offset}", self.base_url());
            let page = unwrap_content(self.get_json(token, &url).await?)?;
            let page_len = page.len();
            all_jobs.extend(page);
            debug!(
                fetched = page_len,
                total = all_jobs.len(),
                "Fetched jobs page"
            );

            if page_len < limit {
                break;
            }
            offset += limit;
        }

        Ok(all_jobs)
    }

    async fn job_details(
        &self,
        token: &str,
        external_id: &str,
        self_link: Option<&str>,
    ) -> Result<Value, ApiClientError> {
        let url = match self_link {
            Some(link) => link.to_string(),
            None => format!("{}/jobs/{external_id}", self.base_url()),
        };
        self.get_json(token, &url).await
    }

    async fn create_subscription(
        &self,
        token: &str,
        callback_url: &str,
    ) -> Result<String, ApiClientError> {
        let url = format!("{}{SUBSCRIPTIONS_PATH}", self.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "callbackUrl": callback_url,
                "events": SUBSCRIBED_EVENTS,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 201 {
            return Err(ApiClientError::Status { status, body });
        }

        let parsed: Value =
            serde_json::from_str(&body).map_err(|e| ApiClientError::Malformed(e.to_string()))?;
        parsed["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiClientError::Malformed("subscription response missing id".to_string()))
    }

    async fn list_subscriptions(&self, token: &str) -> Result<Vec<Value>, ApiClientError> {
        let url = format!("{}{SUBSCRIPTIONS_PATH}", self.base_url());
        unwrap_content(self.get_json(token, &url).await?)
    }

    async fn delete_subscription(&self, token: &str, id: &str) -> Result<(), ApiClientError> {
        let url = format!("{}{SUBSCRIPTIONS_PATH}/{id}", self.base_url());
        let response = self.http.delete(&url).bearer_auth(token).send().await?;
        let status = response.status().as_u16();
        if status == 200 || status == 204 {
            Ok(())
        } else {
            Err(ApiClientError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn activate_subscription(&self, token: &str, id: &str) -> Result<(), ApiClientError> {
        let url = format!("{}{SUBSCRIPTIONS_PATH}/{id}/activation", self.base_url());
        let response = self.http.put(&url).bearer_auth(token).send().await?;
        let status = response.status().as_u16();
        if status == 200 || status == 204 {
            Ok(())
        } else {
            Err(ApiClientError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Pull the access token out of a token-endpoint response.
fn token_from_response(body: &Value) -> Option<&str> {
    body["access_token"].as_str().filter(|t| !t.is_empty())
}

/// List endpoints wrap their payload in `{"content": [...]}`; older
/// revisions return a bare array.
fn unwrap_content(body: Value) -> Result<Vec<Value>, ApiClientError> {
    match body {
        Value::Object(mut map) => match map.remove("content") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ApiClientError::Malformed(format!(
                "content is not an array: {other}"
            ))),
            None => Err(ApiClientError::Malformed(
                "list response missing content".to_string(),
            )),
        },
        Value::Array(items) => Ok(items),
        other => Err(ApiClientError::Malformed(format!(
            "unexpected list response: {other}"
        ))),
    }
}
