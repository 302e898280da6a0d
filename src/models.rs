//! Core data model: uploaded assets, job requests and job snapshots

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::config::UploadConfig;
use crate::error::ValidationError;

/// Fixed clip length in seconds
pub const VIDEO_DURATION_SECONDS: u32 = 4;

/// Provider job ids are 24 alphanumeric characters
pub const JOB_ID_LEN: usize = 24;

/// Which slot of the form an image was uploaded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageRole {
    MainCharacter,
    Background,
    Optional,
}

impl ImageRole {
    /// Multipart field name used on both the inbound form and the provider call
    pub fn field_name(&self) -> &'static str {
        match self {
            ImageRole::MainCharacter => "mainCharacter",
            ImageRole::Background => "background",
            ImageRole::Optional => "optionalImage",
        }
    }
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::MainCharacter => write!(f, "main character image"),
            ImageRole::Background => write!(f, "background image"),
            ImageRole::Optional => write!(f, "optional image"),
        }
    }
}

/// An image payload together with a locally generated preview handle
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
    preview: String,
}

impl UploadedAsset {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let preview = format!("preview-{:x}", md5::compute(&bytes));
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
            preview,
        }
    }

    /// Read an image from disk, guessing the content type from its extension
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let content_type = guess_content_type(&filename);
        Ok(Self::new(filename, content_type, bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Stable handle derived from the payload digest
    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    fn validate(&self, role: ImageRole, limits: &UploadConfig) -> Result<(), ValidationError> {
        if !self.is_image() {
            return Err(ValidationError::NotAnImage {
                role,
                content_type: self.content_type.clone(),
            });
        }
        if self.is_empty() {
            return Err(ValidationError::EmptyImage(role));
        }
        if self.len() > limits.max_image_bytes {
            return Err(ValidationError::ImageTooLarge {
                role,
                size: self.len(),
                limit: limits.max_image_bytes,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for UploadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedAsset")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .field("preview", &self.preview)
            .finish()
    }
}

/// Guess an image mime type from a file name
pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Output frame shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Vertical,
    #[default]
    Horizontal,
    Square,
}

impl AspectRatio {
    /// Encoding expected by the provider
    pub fn provider_value(&self) -> &'static str {
        match self {
            AspectRatio::Vertical => "9:16",
            AspectRatio::Horizontal => "16:9",
            AspectRatio::Square => "1:1",
        }
    }

    /// Width and height units for preview frames
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Vertical => (9, 16),
            AspectRatio::Horizontal => (16, 9),
            AspectRatio::Square => (1, 1),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(AspectRatio::Vertical),
            "horizontal" => Ok(AspectRatio::Horizontal),
            "square" => Ok(AspectRatio::Square),
            _ => Err(ValidationError::InvalidAspectRatio(s.to_string())),
        }
    }
}

/// Output vertical resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "360")]
    P360,
    #[default]
    #[serde(rename = "720")]
    P720,
}

impl Resolution {
    pub fn provider_value(&self) -> &'static str {
        match self {
            Resolution::P360 => "360p",
            Resolution::P720 => "720p",
        }
    }
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('p') {
            "360" => Ok(Resolution::P360),
            "720" => Ok(Resolution::P720),
            _ => Err(ValidationError::InvalidResolution(s.to_string())),
        }
    }
}

/// A video generation request as collected from the form.
///
/// Built by value with the `with_*` methods and never mutated afterwards.
/// Required images are optional here so that a half-filled form can still be
/// represented and rejected by [`VideoJobRequest::validate`].
#[derive(Debug, Clone, Default)]
pub struct VideoJobRequest {
    primary_image: Option<UploadedAsset>,
    background_image: Option<UploadedAsset>,
    optional_image: Option<UploadedAsset>,
    prompt: String,
    aspect_ratio: AspectRatio,
    resolution: Resolution,
}

impl VideoJobRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_primary_image(mut self, asset: UploadedAsset) -> Self {
        self.primary_image = Some(asset);
        self
    }

    pub fn with_background_image(mut self, asset: UploadedAsset) -> Self {
        self.background_image = Some(asset);
        self
    }

    pub fn with_optional_image(mut self, asset: Option<UploadedAsset>) -> Self {
        self.optional_image = asset;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn primary_image(&self) -> Option<&UploadedAsset> {
        self.primary_image.as_ref()
    }

    pub fn background_image(&self) -> Option<&UploadedAsset> {
        self.background_image.as_ref()
    }

    pub fn optional_image(&self) -> Option<&UploadedAsset> {
        self.optional_image.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn duration_seconds(&self) -> u32 {
        VIDEO_DURATION_SECONDS
    }

    /// Move the images out in provider field order, skipping absent ones
    pub fn into_images(self) -> Vec<(ImageRole, UploadedAsset)> {
        [
            (ImageRole::MainCharacter, self.primary_image),
            (ImageRole::Background, self.background_image),
            (ImageRole::Optional, self.optional_image),
        ]
        .into_iter()
        .filter_map(|(role, asset)| asset.map(|asset| (role, asset)))
        .collect()
    }

    /// Check every precondition for submission
    pub fn validate(&self, limits: &UploadConfig) -> Result<(), ValidationError> {
        let primary = self
            .primary_image
            .as_ref()
            .ok_or(ValidationError::MissingImage(ImageRole::MainCharacter))?;
        let background = self
            .background_image
            .as_ref()
            .ok_or(ValidationError::MissingImage(ImageRole::Background))?;

        primary.validate(ImageRole::MainCharacter, limits)?;
        background.validate(ImageRole::Background, limits)?;
        if let Some(extra) = &self.optional_image {
            extra.validate(ImageRole::Optional, limits)?;
        }

        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let len = self.prompt.chars().count();
        if len > limits.max_prompt_chars {
            return Err(ValidationError::PromptTooLong {
                len,
                limit: limits.max_prompt_chars,
            });
        }
        Ok(())
    }
}

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!("^[A-Za-z0-9]{{{}}}$", JOB_ID_LEN)).expect("job id pattern is valid")
    })
}

/// Provider-assigned job identifier with a validated shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if job_id_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidJobId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Processing => 1,
            JobState::Completed | JobState::Error => 2,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of a tracked job.
///
/// `progress` is a local estimate unless the provider reported a number.
/// `result_url` is only ever set together with `Completed`, and
/// `error_message` only together with `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    id: JobId,
    state: JobState,
    progress: u8,
    result_url: Option<String>,
    error_message: Option<String>,
    updated_at: DateTime<Utc>,
}

impl<'de> Deserialize<'de> for VideoJob {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Snapshot {
            id: JobId,
            state: JobState,
            progress: u8,
            result_url: Option<String>,
            error_message: Option<String>,
            updated_at: DateTime<Utc>,
        }

        let snapshot = Snapshot::deserialize(deserializer)?;
        if snapshot.progress > 100 {
            return Err(D::Error::custom("progress must be between 0 and 100"));
        }
        if snapshot.result_url.is_some() != (snapshot.state == JobState::Completed) {
            return Err(D::Error::custom("resultUrl must be present exactly when the job is completed"));
        }
        if snapshot.error_message.is_some() != (snapshot.state == JobState::Error) {
            return Err(D::Error::custom("errorMessage must be present exactly when the job failed"));
        }

        Ok(Self {
            id: snapshot.id,
            state: snapshot.state,
            progress: snapshot.progress,
            result_url: snapshot.result_url,
            error_message: snapshot.error_message,
            updated_at: snapshot.updated_at,
        })
    }
}

impl VideoJob {
    pub fn new(id: JobId, initial_progress: u8) -> Self {
        Self {
            id,
            state: JobState::Pending,
            progress: initial_progress.min(100),
            result_url: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() || next.rank() < self.state.rank() {
            return false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        true
    }

    /// Raise progress, never lowering it
    pub(crate) fn raise_progress(&mut self, progress: u8) {
        if !self.is_terminal() {
            self.progress = self.progress.max(progress.min(100));
        }
    }

    pub(crate) fn mark_processing(&mut self, progress: u8) {
        if self.transition(JobState::Processing) {
            self.raise_progress(progress);
        }
    }

    pub(crate) fn complete(&mut self, url: String) {
        if self.transition(JobState::Completed) {
            self.progress = 100;
            self.result_url = Some(url);
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        if self.transition(JobState::Error) {
            self.error_message = Some(message);
        }
    }
}
