//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, InMemoryAuthService, InMemoryProgressStore},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use chrono::Duration;
use dangdai_core::ports::{AuthService, ProgressStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Pick the Storage Adapters ---
    let session_ttl = Duration::days(config.session_ttl_days);
    let progress: Arc<dyn ProgressStore>;
    let auth: Arc<dyn AuthService>;
    match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool, session_ttl));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            progress = db_adapter.clone();
            auth = db_adapter;
        }
        None => {
            warn!("DATABASE_URL is not set; progress and accounts are kept in memory only");
            progress = Arc::new(InMemoryProgressStore::default());
            auth = Arc::new(InMemoryAuthService::new(session_ttl));
        }
    }

    // --- 3. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(progress, auth, config.clone()));
    let app = build_router(app_state)?;

    // --- 4. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
