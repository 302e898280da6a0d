//! API request handlers

use axum::extract::ws::{Message, WebSocket};
use axum::extract::Multipart;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::models::{ApiError, CreateJobResponse, StatusResponse};
use crate::models::{
    guess_content_type, AspectRatio, ImageRole, Resolution, UploadedAsset, VideoJobRequest,
};
use crate::poller::{StatusPoller, WatchHandle};
use crate::submitter::JobSubmitter;

/// Handle health check requests
pub async fn health_check(provider: &str) -> Value {
    serde_json::json!({
        "status": "healthy",
        "service": "vidu-animator",
        "provider": provider,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })
}

/// Collect the upload form into a request.
///
/// Unknown fields are ignored, as are the fixed `duration` and `model`
/// values a client might send. Empty file parts count as "no file".
pub async fn read_job_form(mut multipart: Multipart) -> Result<VideoJobRequest, ApiError> {
    let mut primary = None;
    let mut background = None;
    let mut optional = None;
    let mut prompt = String::new();
    let mut aspect_ratio = AspectRatio::default();
    let mut resolution = Resolution::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let role = match name.as_str() {
            "mainCharacter" => Some(ImageRole::MainCharacter),
            "background" => Some(ImageRole::Background),
            "optionalImage" => Some(ImageRole::Optional),
            _ => None,
        };

        if let Some(role) = role {
            let filename = field.file_name().unwrap_or(role.field_name()).to_string();
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| guess_content_type(&filename).to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", role, e)))?;
            if bytes.is_empty() {
                continue;
            }

            let asset = UploadedAsset::new(filename, content_type, bytes.to_vec());
            match role {
                ImageRole::MainCharacter => primary = Some(asset),
                ImageRole::Background => background = Some(asset),
                ImageRole::Optional => optional = Some(asset),
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "prompt" => prompt = text,
            "aspectRatio" => aspect_ratio = text.parse()?,
            "resolution" => resolution = text.parse()?,
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    let mut request = VideoJobRequest::new(prompt)
        .with_optional_image(optional)
        .with_aspect_ratio(aspect_ratio)
        .with_resolution(resolution);
    if let Some(asset) = primary {
        request = request.with_primary_image(asset);
    }
    if let Some(asset) = background {
        request = request.with_background_image(asset);
    }
    Ok(request)
}

/// Handle job creation requests
pub async fn create_job(
    submitter: &JobSubmitter,
    request: VideoJobRequest,
) -> Result<CreateJobResponse, ApiError> {
    let job_id = submitter.submit(request).await?;
    Ok(CreateJobResponse::accepted(job_id.to_string()))
}

/// Handle a single status check
pub async fn job_status(poller: &StatusPoller, job_id: &str) -> Result<StatusResponse, ApiError> {
    let report = poller.check_once(job_id).await?;
    Ok(report.into())
}

/// Forward snapshots of a watch to a WebSocket until the job ends or the
/// client goes away
pub async fn stream_job(mut socket: WebSocket, mut handle: WatchHandle) {
    info!(job_id = %handle.job_id(), "🔌 Live watch connected");

    loop {
        tokio::select! {
            snapshot = handle.next() => {
                let Some(snapshot) = snapshot else { break };
                let text = match serde_json::to_string(&snapshot) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize snapshot: {}", e);
                        break;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    info!(job_id = %handle.job_id(), "🔌 Live watch closed during update");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) if text == "ping" => {
                        if socket.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(job_id = %handle.job_id(), "🔌 Live watch closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    handle.cancel();
    let _ = socket.close().await;
    info!(job_id = %handle.job_id(), "🔌 Live watch ended");
}
