//! HTTP front end for the resolver and the reviewer.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::output::render_text;
use crate::providers::CaptionProvider;
use crate::resolver::resolve;
use crate::summarize::Summarizer;
use crate::{InvalidIdentifier, LanguagePreference, VideoId};

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn CaptionProvider>,
    pub languages: Arc<Vec<String>>,
    pub summarizer: Option<Arc<Summarizer>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptBody {
    video_id: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptQuery {
    video_id: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    transcript: Option<String>,
    video_id: Option<String>,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/transcript", post(transcript_post_handler).get(transcript_get_handler))
        .route("/api/analyze", post(analyze_handler))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: AppState, bind: &str) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn transcript_post_handler(State(state): State<AppState>, body: Option<Json<TranscriptBody>>) -> Response {
    let Some(Json(body)) = body else {
        return error(StatusCode::BAD_REQUEST, "Missing videoId");
    };
    transcript_response(&state, body.video_id.as_deref(), body.lang.as_deref()).await
}

async fn transcript_get_handler(State(state): State<AppState>, Query(query): Query<TranscriptQuery>) -> Response {
    transcript_response(&state, query.video_id.as_deref(), query.lang.as_deref()).await
}

async fn transcript_response(state: &AppState, raw_id: Option<&str>, lang: Option<&str>) -> Response {
    let Some(raw_id) = raw_id.filter(|s| !s.trim().is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "Missing videoId");
    };
    let Some(video_id) = VideoId::parse(raw_id) else {
        return error(StatusCode::BAD_REQUEST, InvalidIdentifier(raw_id.to_string()).to_string());
    };

    let preference = LanguagePreference::with_primary(lang, &state.languages);
    match resolve(state.provider.as_ref(), &video_id, &preference).await {
        Ok(result) => {
            let transcript = render_text(&result.entries);
            if transcript.trim().is_empty() {
                return error(StatusCode::NOT_FOUND, "Transcript is empty!");
            }
            Json(serde_json::json!({
                "transcript": transcript,
                "language": result.language,
                "provenance": result.provenance,
            }))
            .into_response()
        }
        Err(failure) => {
            warn!("Transcript request for {video_id} failed: {failure}");
            error(StatusCode::NOT_FOUND, failure.to_string())
        }
    }
}

async fn analyze_handler(State(state): State<AppState>, body: Option<Json<AnalyzeBody>>) -> Response {
    let Some(Json(body)) = body else {
        return error(StatusCode::BAD_REQUEST, "Missing required fields: transcript and videoId are required");
    };
    let (Some(transcript), Some(video_id)) = (
        body.transcript.filter(|t| !t.trim().is_empty()),
        body.video_id.filter(|v| !v.trim().is_empty()),
    ) else {
        return error(StatusCode::BAD_REQUEST, "Missing required fields: transcript and videoId are required");
    };
    let Some(summarizer) = state.summarizer.as_ref() else {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Analysis is not configured on this server");
    };

    match summarizer.summarize(&transcript).await {
        Ok(review) => Json(review).into_response(),
        Err(e) => {
            warn!("Analysis for {video_id} failed: {e}");
            error(StatusCode::BAD_GATEWAY, format!("Failed to analyze transcript: {e}"))
        }
    }
}
