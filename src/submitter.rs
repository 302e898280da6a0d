//! Job submission: local validation followed by a single create call

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, UploadConfig};
use crate::error::SubmitError;
use crate::models::{JobId, VideoJobRequest};
use crate::provider::VideoProvider;

pub struct JobSubmitter {
    provider: Arc<dyn VideoProvider>,
    limits: UploadConfig,
    timeout: Duration,
}

impl JobSubmitter {
    pub fn new(provider: Arc<dyn VideoProvider>, config: &Config) -> Self {
        Self {
            provider,
            limits: config.upload.clone(),
            timeout: config.provider.request_timeout(),
        }
    }

    pub fn limits(&self) -> &UploadConfig {
        &self.limits
    }

    /// Validate and submit a request.
    ///
    /// Invalid requests never reach the provider. Failures are not retried;
    /// the caller may resubmit.
    pub async fn submit(&self, request: VideoJobRequest) -> Result<JobId, SubmitError> {
        if let Err(e) = request.validate(&self.limits) {
            warn!("Rejected video request: {}", e);
            return Err(e.into());
        }

        info!(
            provider = self.provider.name(),
            aspect_ratio = request.aspect_ratio().provider_value(),
            resolution = request.resolution().provider_value(),
            "🎬 Submitting video job"
        );

        let raw_id = tokio::time::timeout(self.timeout, self.provider.create_job(request))
            .await
            .map_err(|_| SubmitError::Timeout(self.timeout))??;

        let raw_id = raw_id.trim();
        if raw_id.is_empty() {
            return Err(SubmitError::MalformedResponse("empty video id".to_string()));
        }
        let job_id = JobId::parse(raw_id)
            .map_err(|_| SubmitError::MalformedResponse(format!("unexpected video id '{}'", raw_id)))?;

        info!(job_id = %job_id, "✅ Video job accepted");
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::models::UploadedAsset;
    use crate::provider::ScriptedProvider;

    const ID: &str = "abc123abc123abc123abc123";

    fn png(name: &str) -> UploadedAsset {
        UploadedAsset::new(name, "image/png", vec![1, 2, 3])
    }

    fn valid_request() -> VideoJobRequest {
        VideoJobRequest::new("A dancing cat")
            .with_primary_image(png("cat.png"))
            .with_background_image(png("bg.png"))
    }

    fn submitter(provider: Arc<ScriptedProvider>) -> JobSubmitter {
        JobSubmitter::new(provider, &Config::default())
    }

    #[tokio::test]
    async fn test_submit_returns_job_id() {
        let provider = Arc::new(ScriptedProvider::new(ID));
        let job_id = submitter(provider.clone()).submit(valid_request()).await.unwrap();

        assert_eq!(job_id.as_str(), ID);
        assert_eq!(provider.create_calls(), 1);
        assert_eq!(provider.last_prompt().as_deref(), Some("A dancing cat"));
    }

    #[tokio::test]
    async fn test_invalid_requests_make_no_calls() {
        let provider = Arc::new(ScriptedProvider::new(ID));
        let submitter = submitter(provider.clone());

        let invalid = [
            VideoJobRequest::new("A dancing cat").with_background_image(png("bg.png")),
            VideoJobRequest::new("A dancing cat").with_primary_image(png("cat.png")),
            VideoJobRequest::new("")
                .with_primary_image(png("cat.png"))
                .with_background_image(png("bg.png")),
        ];

        for request in invalid {
            let err = submitter.submit(request).await.unwrap_err();
            assert!(matches!(err, SubmitError::Validation(_)));
        }
        assert_eq!(provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_rejection_is_surfaced() {
        let provider = Arc::new(ScriptedProvider::new(ID).rejecting_create(402, "Insufficient credits"));
        let err = submitter(provider.clone()).submit(valid_request()).await.unwrap_err();

        match err {
            SubmitError::Provider { status, message } => {
                assert_eq!(status, 402);
                assert_eq!(message, "Insufficient credits");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_malformed() {
        let provider = Arc::new(ScriptedProvider::new("  "));
        let err = submitter(provider).submit(valid_request()).await.unwrap_err();
        assert!(matches!(err, SubmitError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_oversized_image_rejected() {
        let provider = Arc::new(ScriptedProvider::new(ID));
        let config = Config {
            upload: UploadConfig {
                max_image_bytes: 2,
                ..UploadConfig::default()
            },
            ..Config::default()
        };
        let submitter = JobSubmitter::new(provider.clone(), &config);

        let err = submitter.submit(valid_request()).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::ImageTooLarge { .. })
        ));
        assert_eq!(provider.create_calls(), 0);
    }
}
