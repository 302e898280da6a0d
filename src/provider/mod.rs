//! Video generation provider integration
//!
//! The rest of the crate only talks to the provider through [`VideoProvider`],
//! so job submission and polling do not depend on any wire format.

pub mod mock;
pub mod vidu;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PollError, SubmitError};
use crate::models::{JobId, VideoJobRequest};

pub use mock::{ScriptedProvider, StatusStep};
pub use vidu::ViduClient;

/// Job status as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Pending,
    Processing,
    Completed,
    Error,
    /// Any status string this crate does not understand
    Unknown(String),
}

impl ProviderStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "created" => ProviderStatus::Pending,
            "processing" => ProviderStatus::Processing,
            "completed" => ProviderStatus::Completed,
            "error" | "failed" => ProviderStatus::Error,
            _ => ProviderStatus::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProviderStatus::Pending => "pending",
            ProviderStatus::Processing => "processing",
            ProviderStatus::Completed => "completed",
            ProviderStatus::Error => "error",
            ProviderStatus::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProviderStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ProviderStatus::from_wire(&raw))
    }
}

/// One status check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: ProviderStatus,
    pub progress: Option<f64>,
    pub video_url: Option<String>,
    pub message: Option<String>,
}

impl StatusReport {
    pub fn new(status: ProviderStatus) -> Self {
        Self {
            status,
            progress: None,
            video_url: None,
            message: None,
        }
    }

    pub fn processing() -> Self {
        Self::new(ProviderStatus::Processing)
    }

    pub fn completed(video_url: impl Into<String>) -> Self {
        Self {
            video_url: Some(video_url.into()),
            ..Self::new(ProviderStatus::Completed)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(ProviderStatus::Error)
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Narrow interface to a video generation backend
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Issue exactly one create-job call and return the raw provider id
    async fn create_job(&self, request: VideoJobRequest) -> Result<String, SubmitError>;

    /// Issue exactly one status call
    async fn check_status(&self, job_id: &JobId) -> Result<StatusReport, PollError>;

    fn name(&self) -> &str;
}
