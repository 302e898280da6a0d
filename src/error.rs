//! Error types for job submission and status polling

use std::time::Duration;

use crate::models::ImageRole;

/// Generic message used when the provider gives no usable reason
pub const GENERIC_SUBMIT_FAILURE: &str = "Failed to create video";
pub const GENERIC_POLL_FAILURE: &str = "Failed to check video status";
pub const GENERIC_JOB_FAILURE: &str = "Video processing failed";

/// Bad input caught before any network call
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required image: {0}")]
    MissingImage(ImageRole),

    #[error("{role} must be an image, got content type '{content_type}'")]
    NotAnImage { role: ImageRole, content_type: String },

    #[error("{0} is empty")]
    EmptyImage(ImageRole),

    #[error("{role} is {size} bytes, limit is {limit} bytes")]
    ImageTooLarge { role: ImageRole, size: usize, limit: usize },

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Prompt is {len} characters, limit is {limit}")]
    PromptTooLong { len: usize, limit: usize },

    #[error("Invalid video id: '{0}'")]
    InvalidJobId(String),

    #[error("Invalid aspect ratio: '{0}' (expected vertical, horizontal or square)")]
    InvalidAspectRatio(String),

    #[error("Invalid resolution: '{0}' (expected 360 or 720)")]
    InvalidResolution(String),
}

/// Create-job failures
#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Status-check failures
#[derive(thiserror::Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Provider rejected the status check ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Status check timed out after {0:?}")]
    Timeout(Duration),
}

impl SubmitError {
    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(e) => e.to_string(),
            SubmitError::Provider { message, .. } => message.clone(),
            _ => GENERIC_SUBMIT_FAILURE.to_string(),
        }
    }
}

impl PollError {
    /// Message recorded on a job that failed because of this error
    pub fn user_message(&self) -> String {
        match self {
            PollError::Validation(e) => e.to_string(),
            PollError::Provider { message, .. } => message.clone(),
            _ => GENERIC_POLL_FAILURE.to_string(),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
