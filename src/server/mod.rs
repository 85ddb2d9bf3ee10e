use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::transcribe::{TranscriptSource, TranscriptionOutcome, TranscriptionService};
use crate::TranscribeError;

const UPLOAD_HINT: &str =
    "Upload the audio file directly via POST /transcribe/upload as a reliable fallback.";
const CAPTIONS_ONLY_HINT: &str = "This deployment serves existing caption tracks only. \
    Upload the audio via POST /transcribe/upload to transcribe it with the speech API.";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranscriptionService>,
}

pub fn create_router(service: Arc<TranscriptionService>, max_body_bytes: usize) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route("/transcribe", post(transcribe_handler))
        .route("/transcribe/upload", post(upload_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(trace_layer)
        .with_state(AppState { service })
}

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    #[serde(default)]
    pub url: String,

    #[serde(rename = "preferLanguage")]
    pub prefer_language: Option<String>,

    #[serde(rename = "forceOpenAi", default)]
    pub force_openai: bool,
}

#[derive(Serialize)]
struct TranscribeResponse {
    ok: bool,
    source: TranscriptSource,
    transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[tracing::instrument(skip(state, request), fields(url = %request.url))]
async fn transcribe_handler(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> Response {
    match state
        .service
        .transcribe_url(
            &request.url,
            request.prefer_language.as_deref(),
            request.force_openai,
        )
        .await
    {
        Ok(outcome) => success_response(outcome),
        Err(e) => error_response(e, true),
    }
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut prefer_language: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read multipart body");
                return error_response(TranscribeError::MissingFile, false);
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => file_bytes = bytes.to_vec(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read uploaded file");
                        return error_response(TranscribeError::MissingFile, false);
                    }
                }
            }
            Some("preferLanguage") => {
                prefer_language = field.text().await.ok().filter(|s| !s.trim().is_empty());
            }
            _ => {}
        }
    }

    match state
        .service
        .transcribe_upload(file_name.as_deref(), &file_bytes, prefer_language.as_deref())
        .await
    {
        Ok(outcome) => success_response(outcome),
        Err(e) => error_response(e, false),
    }
}

fn success_response(outcome: TranscriptionOutcome) -> Response {
    (
        StatusCode::OK,
        Json(TranscribeResponse {
            ok: true,
            source: outcome.source,
            transcript: outcome.transcript,
            note: outcome.note,
        }),
    )
        .into_response()
}

/// Map workflow errors to the HTTP surface. `offer_upload_fallback` attaches
/// the upload hint to upstream failures; it is off for the upload endpoint,
/// which already is the fallback.
fn error_response(err: TranscribeError, offer_upload_fallback: bool) -> Response {
    let upload_hint = offer_upload_fallback.then_some(UPLOAD_HINT);

    let (status, body) = match err {
        TranscribeError::MissingUrl => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                ok: false,
                error: "missing_url",
                details: None,
                hint: None,
            },
        ),
        TranscribeError::MissingFile => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                ok: false,
                error: "missing_file",
                details: None,
                hint: None,
            },
        ),
        TranscribeError::InvalidVideoRef(reference) => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                ok: false,
                error: "invalid_url",
                details: Some(format!("unrecognized video reference: {reference}")),
                hint: None,
            },
        ),
        TranscribeError::CaptionUnavailable { details } => (
            StatusCode::CONFLICT,
            ErrorBody {
                ok: false,
                error: "caption_unavailable",
                details: Some(details),
                hint: Some(CAPTIONS_ONLY_HINT),
            },
        ),
        TranscribeError::NoAudioStream | TranscribeError::DownloadFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                ok: false,
                error: "download_failed",
                details: Some(err.to_string()),
                hint: upload_hint,
            },
        ),
        TranscribeError::TranscriptionFailed(details) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                ok: false,
                error: "transcription_failed",
                details: Some(details),
                hint: upload_hint,
            },
        ),
        TranscribeError::EmptyTranscript => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                ok: false,
                error: "empty_transcript",
                details: Some(err.to_string()),
                hint: upload_hint,
            },
        ),
        TranscribeError::MissingApiKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                ok: false,
                error: "missing_api_key",
                details: Some(err.to_string()),
                hint: None,
            },
        ),
    };

    if status.is_server_error() {
        tracing::error!(error = body.error, details = ?body.details, "Request failed");
    } else {
        tracing::warn!(error = body.error, "Request rejected");
    }

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: TranscribeError) -> StatusCode {
        error_response(err, true).status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(TranscribeError::MissingUrl), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(TranscribeError::MissingFile), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(TranscribeError::InvalidVideoRef("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TranscribeError::CaptionUnavailable {
                details: "none".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(TranscribeError::NoAudioStream),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(TranscribeError::DownloadFailed("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(TranscribeError::EmptyTranscript),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(TranscribeError::MissingApiKey),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_field_names() {
        let request: TranscribeRequest = serde_json::from_str(
            r#"{"url":"https://youtu.be/dQw4w9WgXcQ","preferLanguage":"en","forceOpenAi":true}"#,
        )
        .unwrap();
        assert_eq!(request.prefer_language.as_deref(), Some("en"));
        assert!(request.force_openai);

        let request: TranscribeRequest = serde_json::from_str(r#"{"url":"x"}"#).unwrap();
        assert!(!request.force_openai);
        assert!(request.prefer_language.is_none());
    }
}
