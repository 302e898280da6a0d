//! Status polling loop and job state machine
//!
//! [`StatusPoller::watch`] spawns one task per job. The task sleeps for the
//! configured interval, checks the status once, folds the result into the
//! [`VideoJob`] and publishes a snapshot. It stops on its own at a terminal
//! state, and stops immediately when the [`WatchHandle`] is cancelled or
//! dropped.
//!
//! Progress is an estimate unless the provider reports a number.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::error::{PollError, GENERIC_JOB_FAILURE};
use crate::models::{JobId, VideoJob};
use crate::provider::{ProviderStatus, StatusReport, VideoProvider};

const SNAPSHOT_BUFFER: usize = 16;

pub struct StatusPoller {
    provider: Arc<dyn VideoProvider>,
    config: PollingConfig,
}

impl StatusPoller {
    pub fn new(provider: Arc<dyn VideoProvider>, config: PollingConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Start watching a job given its raw id.
    ///
    /// A malformed id is rejected here, before any network call.
    pub fn watch(&self, job_id: &str) -> Result<WatchHandle, PollError> {
        let job_id = JobId::parse(job_id)?;
        Ok(self.watch_job(job_id))
    }

    /// Start an independent polling loop for an already validated id
    pub fn watch_job(&self, job_id: JobId) -> WatchHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let job = VideoJob::new(job_id.clone(), self.config.initial_progress);

        info!(job_id = %job_id, interval_ms = self.config.interval_ms, "👀 Watching video job");

        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.provider),
            self.config.clone(),
            job,
            tx,
            cancel.clone(),
        ));

        WatchHandle {
            job_id,
            receiver: rx,
            guard: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    /// One bounded status check, without touching any job state
    pub async fn check_once(&self, job_id: &str) -> Result<StatusReport, PollError> {
        let job_id = JobId::parse(job_id)?;
        let timeout = self.config.status_timeout();
        tokio::time::timeout(timeout, self.provider.check_status(&job_id))
            .await
            .map_err(|_| PollError::Timeout(timeout))?
    }
}

async fn poll_loop(
    provider: Arc<dyn VideoProvider>,
    config: PollingConfig,
    mut job: VideoJob,
    tx: mpsc::Sender<VideoJob>,
    cancel: CancellationToken,
) {
    let interval = config.interval();
    let timeout = config.status_timeout();
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job_id = %job.id(), "Watch cancelled while waiting");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        attempt += 1;
        debug!(job_id = %job.id(), attempt, "Checking video status");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job_id = %job.id(), attempt, "Watch cancelled during status check");
                return;
            }
            outcome = tokio::time::timeout(timeout, provider.check_status(job.id())) => {
                outcome.unwrap_or_else(|_| Err(PollError::Timeout(timeout)))
            }
        };

        // A result that lands after cancellation is stale
        if cancel.is_cancelled() {
            return;
        }

        apply_status(&mut job, result, &config);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = tx.send(job.clone()) => {
                if sent.is_err() {
                    debug!(job_id = %job.id(), "Snapshot receiver gone, stopping watch");
                    return;
                }
            }
        }

        if job.is_terminal() {
            info!(
                job_id = %job.id(),
                state = %job.state(),
                attempts = attempt,
                "🏁 Video job reached a terminal state"
            );
            return;
        }
    }
}

fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 100.0) as u8
    }
}

/// Fold one status check result into the job
pub(crate) fn apply_status(
    job: &mut VideoJob,
    result: Result<StatusReport, PollError>,
    config: &PollingConfig,
) {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            warn!(job_id = %job.id(), "Status check failed: {}", e);
            job.fail(e.user_message());
            return;
        }
    };

    let reported = report.progress.map(clamp_progress);

    match report.status {
        ProviderStatus::Pending => {
            if let Some(progress) = reported {
                job.raise_progress(progress);
            }
        }
        ProviderStatus::Processing => {
            let estimate = job
                .progress()
                .saturating_add(config.progress_increment)
                .min(config.progress_ceiling);
            job.mark_processing(reported.unwrap_or(estimate));
        }
        ProviderStatus::Completed => match report.video_url.filter(|url| !url.trim().is_empty()) {
            Some(url) => job.complete(url),
            None => job.fail("Provider reported completion without a video URL".to_string()),
        },
        ProviderStatus::Error => {
            let message = report
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_JOB_FAILURE.to_string());
            job.fail(message);
        }
        ProviderStatus::Unknown(raw) => {
            job.fail(format!("Unrecognized provider status '{}'", raw));
        }
    }
}

/// Handle to a running watch.
///
/// Dropping the handle cancels the loop.
pub struct WatchHandle {
    job_id: JobId,
    receiver: mpsc::Receiver<VideoJob>,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Next snapshot, or `None` once the job is terminal or the watch cancelled
    pub async fn next(&mut self) -> Option<VideoJob> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            snapshot = self.receiver.recv() => snapshot,
        }
    }

    /// Stop polling. Buffered snapshots are discarded.
    pub fn cancel(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!(job_id = %self.job_id, "Cancelling watch");
        }
        self.cancel.cancel();
        self.receiver.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the polling task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Drain the watch and return the last snapshot seen
    pub async fn wait(mut self) -> Option<VideoJob> {
        let mut last = None;
        while let Some(snapshot) = self.next().await {
            last = Some(snapshot);
        }
        last
    }

    pub fn into_stream(self) -> SnapshotStream {
        SnapshotStream {
            inner: ReceiverStream::new(self.receiver),
            _guard: self.guard,
        }
    }
}

/// Snapshot stream that cancels its polling task when dropped
pub struct SnapshotStream {
    inner: ReceiverStream<VideoJob>,
    _guard: DropGuard,
}

impl Stream for SnapshotStream {
    type Item = VideoJob;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobState;

    fn job() -> VideoJob {
        VideoJob::new(JobId::parse("abc123abc123abc123abc123").unwrap(), 30)
    }

    #[test]
    fn test_processing_increments_up_to_ceiling() {
        let config = PollingConfig::default();
        let mut job = job();

        apply_status(&mut job, Ok(StatusReport::processing()), &config);
        assert_eq!(job.state(), JobState::Processing);
        assert_eq!(job.progress(), 35);

        for _ in 0..20 {
            apply_status(&mut job, Ok(StatusReport::processing()), &config);
        }
        assert_eq!(job.progress(), 90);
    }

    #[test]
    fn test_reported_progress_takes_precedence() {
        let config = PollingConfig::default();
        let mut job = job();

        apply_status(&mut job, Ok(StatusReport::processing().with_progress(62.4)), &config);
        assert_eq!(job.progress(), 62);

        // Lower numbers never move the bar backwards
        apply_status(&mut job, Ok(StatusReport::processing().with_progress(10.0)), &config);
        assert_eq!(job.progress(), 62);
    }

    #[test]
    fn test_pending_keeps_state() {
        let config = PollingConfig::default();
        let mut job = job();
        apply_status(&mut job, Ok(StatusReport::new(ProviderStatus::Pending)), &config);
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.progress(), 30);
    }

    #[test]
    fn test_completed_without_url_is_error() {
        let config = PollingConfig::default();
        let mut job = job();
        apply_status(&mut job, Ok(StatusReport::new(ProviderStatus::Completed)), &config);
        assert_eq!(job.state(), JobState::Error);
        assert!(job.result_url().is_none());
        assert!(job.error_message().is_some());
    }

    #[test]
    fn test_error_without_message_uses_fallback() {
        let config = PollingConfig::default();
        let mut job = job();
        apply_status(&mut job, Ok(StatusReport::new(ProviderStatus::Error)), &config);
        assert_eq!(job.error_message(), Some(GENERIC_JOB_FAILURE));
    }

    #[test]
    fn test_unknown_status_is_error() {
        let config = PollingConfig::default();
        let mut job = job();
        apply_status(
            &mut job,
            Ok(StatusReport::new(ProviderStatus::Unknown("melting".to_string()))),
            &config,
        );
        assert_eq!(job.state(), JobState::Error);
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-5.0), 0);
        assert_eq!(clamp_progress(150.0), 100);
        assert_eq!(clamp_progress(f64::NAN), 0);
        assert_eq!(clamp_progress(49.6), 50);
    }
}
