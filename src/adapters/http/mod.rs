//! HTTP inbound adapter.
//!
//! Thin axum handlers over the packaging service and the Stream Gateway.

mod error;

pub use error::ApiError;

use crate::application::gateway::StreamGateway;
use crate::application::pipeline::PackagingService;
use crate::config::AppConfig;
use crate::domain::jobs::PackagingJob;
use crate::domain::namespace::NamespacePrefix;
use crate::error::PipelineError;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const STREAM_URL_PLACEHOLDER: &str = "__VIDEO_STREAM_URL__";

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: PackagingService,
    pub gateway: StreamGateway,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/convert", get(convert))
        .route("/upload-to-s3", get(upload))
        .route("/stream/:namespace/:filename", get(stream))
        .route("/jobs/latest", get(latest_job))
        .nest_service("/video-local", ServeDir::new(&state.config.working_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let path = &state.config.index_html;
    let page = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::fs(path, e))?;

    Ok(Html(
        page.replace(STREAM_URL_PLACEHOLDER, &state.config.video_stream_url),
    ))
}

async fn convert(State(state): State<Arc<AppState>>) -> Result<Json<PackagingJob>, ApiError> {
    let job = state.pipeline.convert().await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    namespace: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    namespace: NamespacePrefix,
    folder: String,
    job: PackagingJob,
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
) -> Result<Json<UploadResponse>, ApiError> {
    let reuse = params
        .namespace
        .as_deref()
        .map(NamespacePrefix::parse)
        .transpose()?;

    let job = state.pipeline.publish(reuse).await?;
    let namespace = job
        .namespace
        .clone()
        .ok_or_else(|| PipelineError::NoSegmentSet(job.working_dir.clone()))?;

    Ok(Json(UploadResponse {
        folder: state.pipeline.folder(&namespace),
        namespace,
        job,
    }))
}

async fn stream(
    State(state): State<Arc<AppState>>,
    Path((namespace, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let object = state.gateway.open(&namespace, &filename).await?;
    tracing::debug!(key = %object.key, "Streaming object");

    Ok((
        [(header::CONTENT_TYPE, object.content_type)],
        Body::from_stream(object.body),
    )
        .into_response())
}

async fn latest_job(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.last_job().await {
        Some(job) => Json(job).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No job recorded" })),
        )
            .into_response(),
    }
}
