//! One live job per session
//!
//! A session owns at most one [`WatchHandle`]. Starting a new job cancels the
//! previous watch before anything else happens, so two loops never feed the
//! same session.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::SubmitError;
use crate::models::{JobId, VideoJob, VideoJobRequest};
use crate::poller::{StatusPoller, WatchHandle};
use crate::provider::VideoProvider;
use crate::submitter::JobSubmitter;

pub struct Session {
    submitter: JobSubmitter,
    poller: StatusPoller,
    active: Option<WatchHandle>,
    latest: Option<VideoJob>,
}

impl Session {
    pub fn new(provider: Arc<dyn VideoProvider>, config: &Config) -> Self {
        Self {
            submitter: JobSubmitter::new(Arc::clone(&provider), config),
            poller: StatusPoller::new(provider, config.polling.clone()),
            active: None,
            latest: None,
        }
    }

    /// Submit a request and start watching it, discarding any previous job
    pub async fn start(&mut self, request: VideoJobRequest) -> Result<JobId, SubmitError> {
        self.reset();
        let job_id = self.submitter.submit(request).await?;
        let handle = self.poller.watch_job(job_id.clone());
        self.latest = Some(VideoJob::new(job_id.clone(), self.poller.config().initial_progress));
        self.active = Some(handle);
        Ok(job_id)
    }

    /// Wait for the next snapshot of the live job
    pub async fn next(&mut self) -> Option<VideoJob> {
        let handle = self.active.as_mut()?;
        match handle.next().await {
            Some(snapshot) => {
                self.latest = Some(snapshot.clone());
                Some(snapshot)
            }
            None => {
                self.active = None;
                None
            }
        }
    }

    /// Most recent snapshot, including the initial pending one
    pub fn latest(&self) -> Option<&VideoJob> {
        self.latest.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.active.is_some()
    }

    /// Cancel the live watch and forget the job
    pub fn reset(&mut self) {
        if let Some(mut handle) = self.active.take() {
            info!(job_id = %handle.job_id(), "Discarding video job");
            handle.cancel();
        }
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::models::{JobState, UploadedAsset};
    use crate::provider::{ScriptedProvider, StatusReport, StatusStep};
    use std::time::Duration;

    fn request() -> VideoJobRequest {
        VideoJobRequest::new("A dancing cat")
            .with_primary_image(UploadedAsset::new("cat.png", "image/png", vec![1]))
            .with_background_image(UploadedAsset::new("bg.png", "image/png", vec![2]))
    }

    fn config() -> Config {
        ConfigBuilder::new()
            .with_poll_interval(Duration::from_millis(5))
            .build()
    }

    #[tokio::test]
    async fn test_session_runs_to_completion() {
        let provider = Arc::new(ScriptedProvider::new("abc123abc123abc123abc123").with_steps([
            StatusStep::Report(StatusReport::processing()),
            StatusStep::Report(StatusReport::completed("https://cdn.example.com/v.mp4")),
        ]));
        let mut session = Session::new(provider, &config());

        session.start(request()).await.unwrap();
        assert_eq!(session.latest().unwrap().state(), JobState::Pending);

        while session.next().await.is_some() {}

        let last = session.latest().unwrap();
        assert_eq!(last.state(), JobState::Completed);
        assert!(!session.is_watching());
    }

    #[tokio::test]
    async fn test_failed_submit_leaves_session_idle() {
        let provider = Arc::new(ScriptedProvider::new("abc123abc123abc123abc123").rejecting_create(500, "boom"));
        let mut session = Session::new(provider.clone(), &config());

        assert!(session.start(request()).await.is_err());
        assert!(!session.is_watching());
        assert!(session.latest().is_none());
        assert_eq!(provider.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_reset_stops_polling() {
        let provider = Arc::new(ScriptedProvider::new("abc123abc123abc123abc123"));
        let mut session = Session::new(provider.clone(), &config());

        session.start(request()).await.unwrap();
        session.next().await.unwrap();
        session.reset();

        let calls = provider.status_calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.status_calls(), calls);
        assert!(session.next().await.is_none());
    }
}
