//! Speech-to-text client for OpenAI-compatible transcription APIs

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::info;

use crate::config::AppConfig;

pub const DEFAULT_FILENAME: &str = "recording.webm";
pub const DEFAULT_CONTENT_TYPE: &str = "audio/webm";

/// Uploaded audio clip
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl AudioUpload {
    /// Build an upload, filling in the defaults for missing metadata
    pub fn new(bytes: Vec<u8>, filename: Option<String>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            filename: filename
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            content_type: content_type
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        }
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Client for `POST {base_url}/audio/transcriptions`
#[derive(Clone)]
pub struct OpenAiTranscriber {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.transcription_model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY is not configured")?;

        info!(
            "Transcribing {} ({} bytes) with {}",
            audio.filename,
            audio.bytes.len(),
            self.model
        );

        let file = Part::bytes(audio.bytes)
            .file_name(audio.filename)
            .mime_str(&audio.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription request failed with {}: {}", status, body);
        }

        let transcription: TranscriptionResponse = response.json().await?;
        Ok(transcription.text)
    }
}
