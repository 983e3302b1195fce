use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::store::{JobStore, StateStore};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, subscriptions, sync, webhook};
use crate::services::{
    ActivityLog, BulkSyncService, RecruitingApi, RetryScheduler, WebhookProcessor,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jobs: Arc<dyn JobStore>,
    pub state: Arc<dyn StateStore>,
    pub api: Arc<dyn RecruitingApi>,
    pub activity: Arc<ActivityLog>,
    pub processor: Arc<WebhookProcessor>,
    pub bulk_sync: Arc<BulkSyncService>,
}

impl AppState {
    /// Wire the sync engine onto the given store and remote API
    /// implementations. Production passes the Postgres repositories and the
    /// reqwest client; tests pass the in-memory pair and a scripted remote.
    pub fn new(
        config: Arc<Config>,
        jobs: Arc<dyn JobStore>,
        state: Arc<dyn StateStore>,
        api: Arc<dyn RecruitingApi>,
    ) -> Self {
        let activity = Arc::new(ActivityLog::new(Arc::clone(&state)));
        let retry = Arc::new(RetryScheduler::new(
            Arc::clone(&state),
            Arc::clone(&activity),
            config.retry.clone(),
        ));
        let processor = Arc::new(WebhookProcessor::new(
            Arc::clone(&api),
            Arc::clone(&jobs),
            Arc::clone(&activity),
            retry,
        ));
        let bulk_sync = Arc::new(BulkSyncService::new(
            Arc::clone(&api),
            Arc::clone(&jobs),
            Arc::clone(&state),
        ));

        Self {
            config,
            jobs,
            state,
            api,
            activity,
            processor,
            bulk_sync,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    // The webhook provider does not send credentials; permissive CORS is fine
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Inbound webhook endpoint: POST deliveries plus a GET diagnostic
    let webhook_routes = Router::new().route(
        "/webhooks/smartrecruiters",
        get(webhook::probe).post(webhook::receive),
    );

    // Sync management API
    let api_routes = Router::new()
        .route("/api/v1/sync", post(sync::trigger_sync))
        .route("/api/v1/sync/last-run", get(sync::last_run))
        .route("/api/v1/activity", get(sync::activity_log))
        .route(
            "/api/v1/subscriptions",
            post(subscriptions::create_subscription).get(subscriptions::list_subscriptions),
        )
        .route(
            "/api/v1/subscriptions/:id",
            delete(subscriptions::delete_subscription),
        )
        .route(
            "/api/v1/subscriptions/:id/activation",
            put(subscriptions::activate_subscription),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
