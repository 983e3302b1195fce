//! Common test utilities for integration tests.
//!
//! Wires the app against the in-memory stores and a scripted remote API so
//! the full HTTP surface can be exercised without Postgres or network.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use domain::store::{JobStore, StateStore};
use jobsync_api::app::{create_app, AppState};
use jobsync_api::config::Config;
use jobsync_api::services::{ApiClientError, RecruitingApi};
use persistence::memory::{InMemoryJobStore, InMemoryStateStore};

/// Scripted remote recruiting API.
#[derive(Default)]
pub struct StubApi {
    pub fail_token: bool,
    pub summaries: Vec<Value>,
    pub details: Mutex<HashMap<String, Value>>,
    pub subscriptions: Mutex<Vec<Value>>,
}

impl StubApi {
    pub fn with_detail(mut self, external_id: &str, detail: Value) -> Self {
        self.details
            .get_mut()
            .unwrap()
            .insert(external_id.to_string(), detail);
        self
    }
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
        Ok(self.summaries.clone())
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
        callback_url: &str,
    ) -> Result<String, ApiClientError> {
        let id = "sub-test-1".to_string();
        self.subscriptions.lock().unwrap().push(serde_json::json!({
            "id": id,
            "callbackUrl": callback_url,
            "status": "inactive"
        }));
        Ok(id)
    }

    async fn list_subscriptions(&self, _token: &str) -> Result<Vec<Value>, ApiClientError> {
        Ok(self.subscriptions.lock().unwrap().clone())
    }

    async fn delete_subscription(&self, _token: &str, id: &str) -> Result<(), ApiClientError> {
        self.subscriptions
            .lock()
            .unwrap()
            .retain(|sub| sub["id"].as_str() != Some(id));
        Ok(())
    }

    async fn activate_subscription(&self, _token: &str, id: &str) -> Result<(), ApiClientError> {
        for sub in self.subscriptions.lock().unwrap().iter_mut() {
            if sub["id"].as_str() == Some(id) {
                sub["status"] = serde_json::json!("active");
            }
        }
        Ok(())
    }
}

/// A fully wired test harness over in-memory storage.
pub struct TestHarness {
    pub app: Router,
    pub state: AppState,
    pub jobs: Arc<InMemoryJobStore>,
    pub store: Arc<InMemoryStateStore>,
}

pub fn harness(api: StubApi) -> TestHarness {
    harness_with_config(api, &[])
}

pub fn harness_with_config(api: StubApi, overrides: &[(&str, &str)]) -> TestHarness {
    let config = Config::load_for_test(overrides).expect("Failed to load test config");
    let jobs = Arc::new(InMemoryJobStore::new());
    let store = Arc::new(InMemoryStateStore::new());

    let state = AppState::new(
        Arc::new(config),
        jobs.clone() as Arc<dyn JobStore>,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(api),
    );
    let app = create_app(state.clone());

    TestHarness {
        app,
        state,
        jobs,
        store,
    }
}

/// POST a JSON body to a path.
pub fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("body JSON")
}

/// Read a response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
