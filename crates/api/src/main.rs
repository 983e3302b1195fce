use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use domain::models::sync::SyncOptions;
use domain::store::{JobStore, StateStore};
use jobsync_api::app::{create_app, AppState};
use jobsync_api::config::Config;
use jobsync_api::jobs::{BulkSyncJob, JobScheduler};
use jobsync_api::middleware::{init_metrics, logging::init_logging};
use jobsync_api::services::{RecruitingApi, SmartRecruitersClient};
use persistence::repositories::{JobRepository, SyncStateRepository};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging);
    init_metrics();

    info!("Starting jobsync API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let pool = persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    }
    .connect()
    .await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    // Wire the sync engine onto Postgres and the live remote API
    let jobs: Arc<dyn JobStore> = Arc::new(JobRepository::new(pool.clone()));
    let state: Arc<dyn StateStore> = Arc::new(SyncStateRepository::new(pool.clone()));
    let api: Arc<dyn RecruitingApi> =
        Arc::new(SmartRecruitersClient::new(config.smartrecruiters.clone()));

    let config = Arc::new(config);
    let app_state = AppState::new(Arc::clone(&config), jobs, state, api);

    // Scheduled bulk pull-sync
    let mut scheduler = JobScheduler::new();
    if config.sync.scheduled {
        scheduler.register(BulkSyncJob::new(
            Arc::clone(&app_state.bulk_sync),
            SyncOptions {
                exclude_cancelled: config.sync.exclude_cancelled,
            },
        ));
    }
    scheduler.start();

    // Start server
    let app = create_app(app_state);
    let addr = config.socket_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
