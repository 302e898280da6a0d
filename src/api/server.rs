//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State, WebSocketUpgrade},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers;
use super::models::ApiError;
use crate::config::{Config, UploadConfig};
use crate::models::JobId;
use crate::poller::StatusPoller;
use crate::provider::VideoProvider;
use crate::submitter::JobSubmitter;

/// Room for the text fields and multipart framing on top of the images
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub submitter: Arc<JobSubmitter>,
    pub poller: Arc<StatusPoller>,
    pub provider_name: Arc<str>,
}

impl AppState {
    pub fn new(provider: Arc<dyn VideoProvider>, config: &Config) -> Self {
        Self {
            provider_name: Arc::from(provider.name()),
            submitter: Arc::new(JobSubmitter::new(Arc::clone(&provider), config)),
            poller: Arc::new(StatusPoller::new(provider, config.polling.clone())),
        }
    }
}

/// Build the router with all routes and middleware
pub fn router(state: AppState) -> Router {
    let body_limit = body_limit(state.submitter.limits());

    // Configure CORS to allow browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/jobs", post(create_job_handler))
        .route("/jobs/:id/status", get(job_status_handler))
        .route("/jobs/:id/watch", get(watch_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// Three images plus the text fields, saturating for very large limits
fn body_limit(limits: &UploadConfig) -> usize {
    limits
        .max_image_bytes
        .saturating_mul(3)
        .saturating_add(FORM_OVERHEAD_BYTES)
}

/// Configure and start the HTTP server
pub async fn start_http_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("🌐 API server listening on http://{}:{}", host, port);
    info!("🔗 Live job updates available at ws://{}:{}/jobs/:id/watch", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(handlers::health_check(&state.provider_name).await))
}

/// Create job handler
async fn create_job_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let result = match handlers::read_job_form(multipart).await {
        Ok(request) => handlers::create_job(&state.submitter, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Job status handler
async fn job_status_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match handlers::job_status(&state.poller, &id).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// WebSocket handler streaming snapshots of one job
async fn watch_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let job_id = match JobId::parse(&id) {
        Ok(job_id) => job_id,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let handle = state.poller.watch_job(job_id);
    ws.on_upgrade(move |socket| handlers::stream_job(socket, handle))
}
