//! Vidu provider client (multipart upload, bearer token)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{StatusReport, VideoProvider};
use crate::config::Config;
use crate::error::{
    ConfigError, PollError, SubmitError, ValidationError, GENERIC_POLL_FAILURE,
    GENERIC_SUBMIT_FAILURE,
};
use crate::models::{ImageRole, JobId, UploadedAsset, VideoJobRequest};

/// HTTP client for the Vidu video API.
///
/// Built once at startup from [`Config`] and shared; holds the credential so
/// callers never handle it.
pub struct ViduClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    create_timeout: Duration,
    status_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CreateVideoResponse {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ViduClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();
        let base_url = config.provider.base_url()?;

        let client = Client::builder()
            .user_agent(concat!("vidu-animator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key,
            model: config.provider.model.clone(),
            create_timeout: config.provider.request_timeout(),
            status_timeout: config.polling.status_timeout(),
        })
    }

    fn videos_url(&self) -> String {
        format!("{}/v1/videos", self.base_url)
    }

    fn video_url(&self, job_id: &JobId) -> String {
        format!("{}/v1/videos/{}", self.base_url, job_id)
    }

    fn build_form(&self, request: VideoJobRequest) -> Result<Form, SubmitError> {
        let aspect_ratio = request.aspect_ratio().provider_value();
        let resolution = request.resolution().provider_value();
        let duration = request.duration_seconds().to_string();
        let prompt = request.prompt().to_string();

        let mut form = Form::new();
        for (role, asset) in request.into_images() {
            form = form.part(role.field_name(), image_part(role, asset)?);
        }

        Ok(form
            .text("prompt", prompt)
            .text("aspectRatio", aspect_ratio)
            .text("resolution", resolution)
            .text("duration", duration)
            .text("model", self.model.clone()))
    }
}

fn image_part(role: ImageRole, asset: UploadedAsset) -> Result<Part, SubmitError> {
    let filename = asset.filename().to_string();
    let content_type = asset.content_type().to_string();
    Part::bytes(asset.into_bytes())
        .file_name(filename)
        .mime_str(&content_type)
        .map_err(|_| {
            SubmitError::Validation(ValidationError::NotAnImage { role, content_type })
        })
}

/// Pull a human readable message out of an error response body
async fn error_message(response: Response, fallback: &str) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn submit_transport_error(e: reqwest::Error, timeout: Duration) -> SubmitError {
    if e.is_timeout() {
        SubmitError::Timeout(timeout)
    } else {
        SubmitError::Transport(e.to_string())
    }
}

fn poll_transport_error(e: reqwest::Error, timeout: Duration) -> PollError {
    if e.is_timeout() {
        PollError::Timeout(timeout)
    } else if e.is_decode() {
        PollError::MalformedResponse(e.to_string())
    } else {
        PollError::Transport(e.to_string())
    }
}

#[async_trait]
impl VideoProvider for ViduClient {
    async fn create_job(&self, request: VideoJobRequest) -> Result<String, SubmitError> {
        let form = self.build_form(request)?;
        let url = self.videos_url();

        debug!("Sending create request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.create_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| submit_transport_error(e, self.create_timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = error_message(response, GENERIC_SUBMIT_FAILURE).await;
            warn!("Vidu create request failed {}: {}", status, message);
            return Err(SubmitError::Provider { status, message });
        }

        let text = response
            .text()
            .await
            .map_err(|e| submit_transport_error(e, self.create_timeout))?;
        let body: CreateVideoResponse = serde_json::from_str(&text)
            .map_err(|e| SubmitError::MalformedResponse(format!("invalid JSON: {}", e)))?;

        body.video_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| SubmitError::MalformedResponse("response has no videoId".to_string()))
    }

    async fn check_status(&self, job_id: &JobId) -> Result<StatusReport, PollError> {
        let url = self.video_url(job_id);

        debug!(job_id = %job_id, "Checking status at {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(|e| poll_transport_error(e, self.status_timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = error_message(response, GENERIC_POLL_FAILURE).await;
            warn!(job_id = %job_id, "Vidu status request failed {}: {}", status, message);
            return Err(PollError::Provider { status, message });
        }

        response
            .json::<StatusReport>()
            .await
            .map_err(|e| poll_transport_error(e, self.status_timeout))
    }

    fn name(&self) -> &str {
        "vidu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn test_requires_api_key() {
        let config = ConfigBuilder::new().build();
        assert!(ViduClient::new(&config).is_err());
    }

    #[test]
    fn test_urls() {
        let config = ConfigBuilder::new()
            .with_api_key("k")
            .with_base_url("http://127.0.0.1:9000/")
            .build();
        let client = ViduClient::new(&config).unwrap();
        let id = JobId::parse("abc123abc123abc123abc123").unwrap();

        assert_eq!(client.videos_url(), "http://127.0.0.1:9000/v1/videos");
        assert_eq!(
            client.video_url(&id),
            "http://127.0.0.1:9000/v1/videos/abc123abc123abc123abc123"
        );
    }
}
