//! Application state shared across handlers

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    oauth::GoogleOAuth,
    repositories::{PresetStore, UserStore},
    session::SessionManager,
    transcription::Transcriber,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionManager,
    pub users: Arc<dyn UserStore>,
    pub presets: Arc<dyn PresetStore>,
    pub transcriber: Arc<dyn Transcriber>,
    /// Present only when Google credentials are configured
    pub google: Option<GoogleOAuth>,
    /// Present only for the PostgreSQL backend
    pub db_pool: Option<PgPool>,
}
