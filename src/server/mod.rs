//! HTTP API for the relay.
//!
//! Binds `server.host:server.port` (port 10000 by default, `PORT` wins).
//! CORS-permissive by default so the browser recorder page can call it
//! from any origin.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::audio::UploadValidator;
use crate::config::ServerConfig;
use crate::pipeline::PipelineRunner;
use crate::relay::Relay;

pub use error::ApiError;

/// Room for multipart boundaries and part headers on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub runner: Arc<PipelineRunner>,
    pub validator: UploadValidator,
}

impl AppState {
    pub fn new(runner: Arc<PipelineRunner>, config: &ServerConfig) -> Self {
        Self {
            relay: Arc::clone(runner.relay()),
            runner,
            validator: UploadValidator::new(config.max_upload_bytes),
        }
    }
}

/// Build the axum router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/", get(handlers::index))
        .route("/process-audio", post(handlers::process_audio))
        .route("/upload", post(handlers::upload))
        .route("/get-audio-stream", get(handlers::get_audio_stream))
        .route("/status", get(handlers::status))
        .route("/clear", post(handlers::clear))
        .route("/tts", post(handlers::tts))
        .route("/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(state);

    if config.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("server: listening on http://{addr}");

    axum::serve(listener, router(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("server: stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("server: failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("server: shutdown requested");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::llm::{Completer, MockCompleter};
    use crate::relay::AudioArtifact;
    use crate::stt::{MockTranscriber, SttError, Transcriber};
    use crate::tts::{MockSynthesizer, Synthesizer};

    const BOUNDARY: &str = "relay-test-boundary";
    const WAV: &[u8] = b"RIFF\0\0\0\0WAVEfmt \x10\0\0\0";

    fn app_with(
        stt: Arc<dyn Transcriber>,
        llm: Arc<dyn Completer>,
        tts: Arc<dyn Synthesizer>,
        server: ServerConfig,
    ) -> (Router, Arc<Relay>) {
        let relay = Arc::new(Relay::new());
        let runner = Arc::new(PipelineRunner::new(
            Arc::clone(&relay),
            stt,
            llm,
            tts,
            &AppConfig::default(),
        ));
        let state = AppState::new(runner, &server);
        (router(state, &server), relay)
    }

    fn arabic_app() -> (Router, Arc<Relay>) {
        app_with(
            Arc::new(MockTranscriber::ok("مرحبا")),
            Arc::new(MockCompleter::ok("أهلا بك")),
            Arc::new(MockSynthesizer::ok(vec![0xFF; 3200], "audio/mpeg")),
            ServerConfig::default(),
        )
    }

    fn multipart_request(uri: &str, field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
            None => format!("form-data; name=\"{field}\""),
        };
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = send(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    // ---- end-to-end ---

    #[tokio::test]
    async fn arabic_upload_then_pickup_once() {
        let (app, _) = arabic_app();

        let (status, json) = send_json(
            &app,
            multipart_request("/process-audio", "audio", Some("rec.wav"), WAV),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "text": "أهلا بك" }));

        let (_, json) = send_json(&app, get("/status")).await;
        assert_eq!(json["server"], "online");
        assert_eq!(json["status"], "ready_for_pickup");
        assert_eq!(json["has_audio"], true);
        assert_eq!(json["sequence"], 1);

        let (status, headers, body) = send(&app, get("/get-audio-stream")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(headers["x-audio-sequence"], "1");
        assert_eq!(body.len(), 3200);

        let (status, json) = send_json(&app, get("/get-audio-stream")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "no audio");

        let (_, json) = send_json(&app, get("/status")).await;
        assert_eq!(json["status"], "ready");
        assert_eq!(json["has_audio"], false);
        assert!(json.get("sequence").is_none());
    }

    #[tokio::test]
    async fn empty_transcript_is_500_and_nothing_waits() {
        let (app, _) = app_with(
            Arc::new(MockTranscriber::ok("")),
            Arc::new(MockCompleter::ok("x")),
            Arc::new(MockSynthesizer::ok(vec![1], "audio/mpeg")),
            ServerConfig::default(),
        );

        let (status, json) = send_json(
            &app,
            multipart_request("/process-audio", "audio", Some("rec.wav"), WAV),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("transcription"));

        let (_, json) = send_json(&app, get("/status")).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["stage"], "transcription");
        assert_eq!(json["has_audio"], false);
    }

    #[tokio::test]
    async fn failed_run_leaves_previous_reply_downloadable() {
        let (app, relay) = app_with(
            Arc::new(MockTranscriber::err(SttError::Timeout)),
            Arc::new(MockCompleter::ok("x")),
            Arc::new(MockSynthesizer::ok(vec![1], "audio/mpeg")),
            ServerConfig::default(),
        );
        relay.deposit(AudioArtifact::new(
            relay.next_sequence(),
            b"earlier".to_vec(),
            "audio/mpeg",
            "earlier reply",
        ));

        let (status, _) = send_json(
            &app,
            multipart_request("/process-audio", "audio", Some("rec.wav"), WAV),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, json) = send_json(&app, get("/status")).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["has_audio"], true);

        let (status, _, body) = send(&app, get("/get-audio-stream")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"earlier");
    }

    // ---- bad uploads ---

    #[tokio::test]
    async fn missing_audio_field_is_400() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(
            &app,
            multipart_request("/process-audio", "note", None, b"hello"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn empty_audio_file_is_400() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(
            &app,
            multipart_request("/process-audio", "audio", Some("rec.wav"), b""),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "uploaded audio file is empty");
    }

    #[tokio::test]
    async fn non_multipart_body_is_400() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(&app, post_json("/process-audio", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn oversize_upload_is_413() {
        let (app, relay) = app_with(
            Arc::new(MockTranscriber::ok("a")),
            Arc::new(MockCompleter::ok("b")),
            Arc::new(MockSynthesizer::ok(vec![1], "audio/mpeg")),
            ServerConfig {
                max_upload_bytes: 1024,
                ..ServerConfig::default()
            },
        );
        let mut big = WAV.to_vec();
        big.resize(4096, 0);

        let (status, json) = send_json(
            &app,
            multipart_request("/process-audio", "audio", Some("rec.wav"), &big),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json["error"].as_str().unwrap().contains("too large"));
        assert_eq!(relay.status(), crate::pipeline::PipelineStatus::Ready);
    }

    #[tokio::test]
    async fn first_file_field_is_accepted_when_not_named_audio() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(
            &app,
            multipart_request("/process-audio", "file", Some("rec.wav"), WAV),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"], "أهلا بك");
    }

    // ---- auxiliary routes ---

    #[tokio::test]
    async fn upload_route_reports_transcript_and_reply() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(
            &app,
            multipart_request("/upload", "audio", Some("rec.webm"), WAV),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["text"], "مرحبا");
        assert_eq!(json["response"], "أهلا بك");
        assert_eq!(json["audio_url"], "/get-audio-stream");
    }

    #[tokio::test]
    async fn upload_route_errors_carry_status_field() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(
            &app,
            multipart_request("/upload", "audio", Some("rec.wav"), b""),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn clear_empties_the_slot() {
        let (app, _) = arabic_app();
        send(&app, multipart_request("/process-audio", "audio", None, WAV)).await;

        let (status, json) = send_json(
            &app,
            Request::builder()
                .method("POST")
                .uri("/clear")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "cleared");

        let (_, json) = send_json(&app, get("/status")).await;
        assert_eq!(json["has_audio"], false);
        assert_eq!(json["status"], "ready");
    }

    #[tokio::test]
    async fn chat_and_tts_bypass_the_relay() {
        let (app, relay) = arabic_app();

        let (status, json) =
            send_json(&app, post_json("/chat", serde_json::json!({ "text": "مرحبا" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reply"], "أهلا بك");

        let (status, headers, body) =
            send(&app, post_json("/tts", serde_json::json!({ "text": "أهلا بك" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body.len(), 3200);

        assert!(!relay.has_audio());
    }

    #[tokio::test]
    async fn blank_text_is_400() {
        let (app, _) = arabic_app();
        let (status, _) = send_json(&app, post_json("/tts", serde_json::json!({ "text": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send_json(&app, post_json("/chat", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_reports_running() {
        let (app, _) = arabic_app();
        let (status, json) = send_json(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }
}
