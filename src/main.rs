// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use assessment_backend::config::Config;
use assessment_backend::repository::postgres::{PgAttemptStore, PgDirectory, PgTopicCatalog};
use assessment_backend::routes;
use assessment_backend::state::AppState;
use assessment_backend::storage::LocalFileStorage;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = connect_with_retry(&config.database_url).await?;
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    let storage = LocalFileStorage::new(&config.upload_dir, &config.upload_base_url);
    tokio::fs::create_dir_all(storage.root()).await?;

    tracing::info!(
        "Scoring scale 0-{}, weak points below {}",
        config.scoring.max_score,
        config.scoring.weak_point_threshold
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(
        config,
        Arc::new(PgDirectory::new(pool.clone())),
        Arc::new(PgAttemptStore::new(pool.clone())),
        Arc::new(storage),
        Arc::new(PgTopicCatalog::new(pool)),
    );

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// The database container may still be starting; retry a few times before giving up.
async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
