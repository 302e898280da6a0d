//! API data models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{PollError, SubmitError, ValidationError};
use crate::provider::StatusReport;

/// Response to `POST /jobs`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    pub message: String,
}

impl CreateJobResponse {
    pub fn accepted(video_id: String) -> Self {
        Self {
            success: true,
            video_id: Some(video_id),
            message: "Video job created".to_string(),
        }
    }
}

/// Response to `GET /jobs/:id/status`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub progress: Option<f64>,
    pub video_url: Option<String>,
    pub message: Option<String>,
}

impl From<StatusReport> for StatusResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            status: report.status.as_str().to_string(),
            progress: report.progress,
            video_url: report.video_url,
            message: report.message,
        }
    }
}

/// Error type for HTTP handlers.
///
/// Every variant renders as `{ "success": false, "message": .., "error": .. }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn passthrough(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Submit(SubmitError::Validation(_)) | ApiError::Poll(PollError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Submit(SubmitError::Provider { status, .. })
            | ApiError::Poll(PollError::Provider { status, .. }) => passthrough(*status),
            ApiError::Submit(SubmitError::Timeout(_)) | ApiError::Poll(PollError::Timeout(_)) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Submit(_) | ApiError::Poll(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Validation(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Submit(e) => e.user_message(),
            ApiError::Poll(e) => e.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let message = self.message();
        let body = serde_json::json!({
            "success": false,
            "message": message,
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
