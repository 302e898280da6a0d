//! Vidu Animator
//!
//! Submits character animation jobs (a main character image, a background
//! image and a prompt) to the Vidu video API and follows them to completion.

pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod provider;
pub mod session;
pub mod submitter;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ConfigError, PollError, SubmitError, ValidationError};
pub use crate::models::{
    AspectRatio, ImageRole, JobId, JobState, Resolution, UploadedAsset, VideoJob, VideoJobRequest,
};
pub use crate::poller::{SnapshotStream, StatusPoller, WatchHandle};
pub use crate::provider::{ProviderStatus, StatusReport, VideoProvider, ViduClient};
pub use crate::session::Session;
pub use crate::submitter::JobSubmitter;
