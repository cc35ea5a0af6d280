use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chaos_device_service::{api, config::Config, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chaos_device_service=debug,server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Chaos device service starting ===");

    let config = Config::from_env()?;
    tracing::info!(
        "Heartbeat threshold {}s, page size {} (max {})",
        config.heartbeat_threshold.num_seconds(),
        config.default_page_size,
        config.max_page_size
    );

    // Database
    let pool = db::init_pool(&config.database_url, config.max_connections).await?;
    tracing::info!("Database ready");

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(pool, config));
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
