//! ShareSpace server
//!
//! Serves the authentication authority and content API over SQLite.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sharespace::backend::LocalBackend;
use sharespace::config::Config;
use sharespace::db::Repository;
use sharespace::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ShareSpace server");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Kindness policy: {:?}", config.kindness_policy);

    // Initialize database
    let repo = Repository::open(&config.db_path).await?;
    let backend = Arc::new(LocalBackend::new(repo, config.local_settings()));

    if config.seed_posts {
        backend.seed_default_posts().await?;
    }

    let state = AppState { backend };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
