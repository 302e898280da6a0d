//! Scripted in-memory provider for tests and offline demos

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{StatusReport, VideoProvider};
use crate::error::{PollError, SubmitError};
use crate::models::{JobId, VideoJobRequest};

/// One scripted answer to a status check
#[derive(Debug, Clone)]
pub enum StatusStep {
    Report(StatusReport),
    Reject { status: u16, message: String },
    Transport(String),
    /// Sleep before answering with a processing report
    Stall(Duration),
}

/// Provider that replays a fixed script and counts calls.
///
/// Once the script runs out every status check reports "processing".
pub struct ScriptedProvider {
    job_id: String,
    create_rejection: Option<(u16, String)>,
    steps: Mutex<VecDeque<StatusStep>>,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedProvider {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            create_rejection: None,
            steps: Mutex::new(VecDeque::new()),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn with_steps(self, steps: impl IntoIterator<Item = StatusStep>) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(steps);
        self
    }

    pub fn rejecting_create(mut self, status: u16, message: impl Into<String>) -> Self {
        self.create_rejection = Some((status, message.into()));
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_step(&self) -> Option<StatusStep> {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }
}

#[async_trait]
impl VideoProvider for ScriptedProvider {
    async fn create_job(&self, request: VideoJobRequest) -> Result<String, SubmitError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.prompt().to_string());

        match &self.create_rejection {
            Some((status, message)) => Err(SubmitError::Provider {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(self.job_id.clone()),
        }
    }

    async fn check_status(&self, _job_id: &JobId) -> Result<StatusReport, PollError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        match self.next_step() {
            Some(StatusStep::Report(report)) => Ok(report),
            Some(StatusStep::Reject { status, message }) => Err(PollError::Provider { status, message }),
            Some(StatusStep::Transport(message)) => Err(PollError::Transport(message)),
            Some(StatusStep::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(StatusReport::processing())
            }
            None => Ok(StatusReport::processing()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
