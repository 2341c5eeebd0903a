//! Service configuration loaded from `REFILE_*` environment variables

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;
use std::env;

/// Where sessions, users and presets live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

/// API service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    /// Marks cookies `Secure`
    pub production: bool,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub transcription_model: String,
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        let mut config: AppConfig = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("storage", "postgres")?
            .set_default("production", false)?
            .set_default(
                "google_redirect_url",
                "http://localhost:3000/login/google/callback",
            )?
            .set_default("openai_base_url", "https://api.openai.com/v1")?
            .set_default("transcription_model", "gpt-4o-mini-transcribe")?
            .add_source(Environment::with_prefix("REFILE"))
            .build()?
            .try_deserialize()?;

        fallback(&mut config.google_client_id, "GOOGLE_CLIENT_ID");
        fallback(&mut config.google_client_secret, "GOOGLE_CLIENT_SECRET");
        fallback(&mut config.openai_api_key, "OPENAI_API_KEY");

        Ok(config)
    }

    /// Address to bind the listener to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Google client id and secret, when both are set
    pub fn google_credentials(&self) -> Option<(&str, &str)> {
        match (&self.google_client_id, &self.google_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            storage: StorageBackend::Postgres,
            production: false,
            google_client_id: None,
            google_client_secret: None,
            google_redirect_url: "http://localhost:3000/login/google/callback".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "gpt-4o-mini-transcribe".to_string(),
        }
    }
}

fn fallback(value: &mut Option<String>, var: &str) {
    if value.as_deref().is_none_or(str::is_empty) {
        if let Ok(found) = env::var(var) {
            *value = Some(found);
        }
    }
}
