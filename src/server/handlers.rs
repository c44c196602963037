//! Route handlers.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/process-audio` | device upload → `{"text": reply}` |
//! | POST | `/upload` | web recorder upload → transcript, reply and audio URL |
//! | GET | `/get-audio-stream` | pull (and consume) the waiting reply audio |
//! | GET | `/status` | status, `has_audio`, failed stage, waiting sequence |
//! | POST | `/clear` | empty the slot and forget the last error |
//! | POST | `/tts` | synthesize `{"text": …}` directly |
//! | POST | `/chat` | complete `{"text": …}` directly |
//! | GET | `/` | liveness |

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::audio::AudioClip;
use crate::pipeline::{PipelineError, PipelineStatus, Stage};

use super::error::ApiError;
use super::AppState;

/// Carries the sequence of the artifact in a `/get-audio-stream` response.
pub const AUDIO_SEQUENCE_HEADER: HeaderName = HeaderName::from_static("x-audio-sequence");

const AUDIO_FIELD: &str = "audio";

// ─── Request / response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub text: String,
    pub response: String,
    pub audio_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub server: &'static str,
    pub status: PipelineStatus,
    pub has_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// `/upload` reports errors as `{"status": "error", "error": …}`.
pub struct UploadError(ApiError);

impl From<ApiError> for UploadError {
    fn from(e: ApiError) -> Self {
        UploadError(e)
    }
}

impl From<PipelineError> for UploadError {
    fn from(e: PipelineError) -> Self {
        UploadError(ApiError::Pipeline(e))
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        log::warn!("server: /upload {status}: {}", self.0);
        (
            status,
            Json(serde_json::json!({ "status": "error", "error": self.0.to_string() })),
        )
            .into_response()
    }
}

// ─── Upload extraction ─────────────────────────────────────────────────────

struct UploadedFile {
    data: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

/// Read the `audio` field, or failing that the first file field.
async fn read_audio_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await? {
        let named_audio = field.name() == Some(AUDIO_FIELD);
        let is_file = field.file_name().is_some();
        if !named_audio && (!is_file || fallback.is_some()) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        let upload = UploadedFile {
            data,
            content_type,
            file_name,
        };

        if named_audio {
            return Ok(upload);
        }
        fallback = Some(upload);
    }

    fallback.ok_or_else(|| ApiError::BadRequest("no audio file provided".into()))
}

async fn accept_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<AudioClip, ApiError> {
    let mut multipart = multipart?;
    let upload = read_audio_field(&mut multipart).await?;
    log::info!(
        "server: received {} bytes ({:?}, {:?})",
        upload.data.len(),
        upload.file_name,
        upload.content_type
    );
    Ok(state.validator.validate(
        upload.data,
        upload.content_type.as_deref(),
        upload.file_name.as_deref(),
    )?)
}

fn non_empty_text(body: Result<Json<TextRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text is required".into()));
    }
    Ok(text.to_string())
}

// ─── Handlers ──────────────────────────────────────────────────────────────

pub async fn process_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let clip = accept_upload(&state, multipart).await?;
    let outcome = state.runner.run_detached(clip).await?;
    Ok(Json(ProcessResponse {
        text: outcome.reply,
    }))
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    let clip = accept_upload(&state, multipart).await?;
    let outcome = state.runner.run_detached(clip).await?;
    Ok(Json(UploadResponse {
        status: "ok",
        text: outcome.transcript,
        response: outcome.reply,
        audio_url: "/get-audio-stream",
    }))
}

pub async fn get_audio_stream(State(state): State<AppState>) -> Result<Response, ApiError> {
    let artifact = state.relay.retrieve().ok_or(ApiError::NoAudioAvailable)?;
    let headers = [
        (header::CONTENT_TYPE, artifact.media_type().to_string()),
        (AUDIO_SEQUENCE_HEADER, artifact.sequence().to_string()),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    Ok((StatusCode::OK, headers, artifact.into_bytes()).into_response())
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snap = state.relay.peek_status();
    Json(StatusResponse {
        server: "online",
        status: snap.status,
        has_audio: snap.has_audio,
        stage: snap.status.failed_stage(),
        sequence: snap.sequence,
    })
}

pub async fn clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.relay.clear();
    Json(serde_json::json!({ "status": "cleared" }))
}

pub async fn tts(
    State(state): State<AppState>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let text = non_empty_text(body)?;
    let audio = state.runner.speak(&text).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, audio.media_type)],
        audio.bytes,
    )
        .into_response())
}

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let text = non_empty_text(body)?;
    let reply = state.runner.reply(&text).await?;
    Ok(Json(ChatResponse { reply }))
}

pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "voice relay server is running"
    }))
}
