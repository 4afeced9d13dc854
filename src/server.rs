//! HTTP surface for finished videos.
//!
//! Only the streaming endpoint and a health probe live here; upload handling
//! and metadata endpoints belong to the surrounding application.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::SubcastError;
use crate::storage::StorageLayout;
use crate::stream::{RangeStreamer, StreamRequest};

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub videos_dir: PathBuf,
    pub streamer: RangeStreamer,
}

/// HTTP error type
#[derive(Debug)]
pub enum HttpError {
    NotFound(String),
    RangeNotSatisfiable(u64),
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::NotFound(name) => (StatusCode::NOT_FOUND, format!("Video not found: {}", name)).into_response(),
            HttpError::RangeNotSatisfiable(size) => {
                let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                    response.headers_mut().insert(header::CONTENT_RANGE, value);
                }
                response
            }
            HttpError::Internal(msg) => {
                error!("Streaming failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<SubcastError> for HttpError {
    fn from(err: SubcastError) -> Self {
        match err {
            SubcastError::ArtifactNotFound(path) => HttpError::NotFound(path.display().to_string()),
            SubcastError::RangeNotSatisfiable { size, .. } => HttpError::RangeNotSatisfiable(size),
            other => HttpError::Internal(other.to_string()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/videos/{name}", get(stream_video))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `uploads/videos` until the process is stopped
pub async fn serve(layout: &StorageLayout, config: &ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        videos_dir: layout.videos_dir(),
        streamer: RangeStreamer::new(config.chunk_size),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Serving {} on http://{}", layout.videos_dir().display(), addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

async fn stream_video(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    if !is_plain_file_name(&name) {
        return Err(HttpError::NotFound(name));
    }

    let mut request = StreamRequest::new(state.videos_dir.join(&name));
    if let Some(range) = headers.get(header::RANGE) {
        request = request.with_range(String::from_utf8_lossy(range.as_bytes()));
    }

    let response = state.streamer.respond(&request).await?;
    Ok(response.into_response())
}

/// A single normal path component, so requests cannot leave the videos directory
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
