//! Voice transcription handler

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::IntoResponse,
};
use serde_json::json;
use tracing::error;

use crate::{error::ApiError, state::AppState, transcription::AudioUpload};

/// Multipart field carrying the recording
const AUDIO_FIELD: &str = "audio";

fn no_file() -> ApiError {
    ApiError::BadRequest("No file uploaded".to_string())
}

/// Transcribe the `audio` field of a multipart upload
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|_| no_file())?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some(AudioUpload::new(bytes.to_vec(), filename, content_type));
        break;
    }

    let upload = upload.ok_or_else(no_file)?;

    let text = state.transcriber.transcribe(upload).await.map_err(|e| {
        error!("Transcription error: {}", e);
        ApiError::Internal("Failed to transcribe audio")
    })?;

    Ok(Json(json!({ "text": text })))
}
