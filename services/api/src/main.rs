use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod oauth;
mod repositories;
mod routes;
mod session;
mod state;
mod transcription;
mod validation;

use refile_common::database::{DatabaseConfig, health_check, init_pool, run_migrations};

use crate::{
    config::{AppConfig, StorageBackend},
    oauth::GoogleOAuth,
    repositories::{
        PgPresetRepository, PgSessionRepository, PgUserRepository, PresetStore, SessionStore,
        UserStore, memory::MemoryStore,
    },
    session::SessionManager,
    state::AppState,
    transcription::OpenAiTranscriber,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ReFile API service");

    let config = AppConfig::from_env()?;

    let (session_store, users, presets, db_pool) = match config.storage {
        StorageBackend::Postgres => {
            // Initialize database connection pool
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            // Check database connectivity
            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;

            (
                Arc::new(PgSessionRepository::new(pool.clone())) as Arc<dyn SessionStore>,
                Arc::new(PgUserRepository::new(pool.clone())) as Arc<dyn UserStore>,
                Arc::new(PgPresetRepository::new(pool.clone())) as Arc<dyn PresetStore>,
                Some(pool),
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            let store = MemoryStore::new();
            (
                Arc::new(store.clone()) as Arc<dyn SessionStore>,
                Arc::new(store.clone()) as Arc<dyn UserStore>,
                Arc::new(store) as Arc<dyn PresetStore>,
                None,
            )
        }
    };

    let sessions = SessionManager::new(session_store);
    sessions.purge_expired().await?;

    let google = GoogleOAuth::from_config(&config)?;
    if google.is_none() {
        info!("Google credentials not configured, OAuth login disabled");
    }

    let transcriber = Arc::new(OpenAiTranscriber::new(&config));
    let bind_address = config.bind_address();

    let app_state = AppState {
        config: Arc::new(config),
        sessions,
        users,
        presets,
        transcriber,
        google,
        db_pool,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("ReFile API service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
