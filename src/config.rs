use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the Vidu animator
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Video generation provider settings
    pub provider: ProviderConfig,

    /// Status polling settings
    pub polling: PollingConfig,

    /// Upload limits
    pub upload: UploadConfig,

    /// HTTP gateway settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    pub base_url: String,

    /// Bearer token, normally supplied through VIDU_API_KEY
    pub api_key: Option<String>,

    /// Model identifier sent with every job
    pub model: String,

    /// Timeout for the create-job call (seconds)
    pub request_timeout_seconds: u64,
}

// Keeps the credential out of logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between the end of one status check and the start of the next
    pub interval_ms: u64,

    /// Upper bound for a single status check (seconds)
    pub status_timeout_seconds: u64,

    /// Progress added for every "processing" report without a number
    pub progress_increment: u8,

    /// Estimated progress never goes above this while processing
    pub progress_ceiling: u8,

    /// Progress shown right after the job was accepted
    pub initial_progress: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum size of a single image in bytes
    pub max_image_bytes: usize,

    /// Maximum prompt length in characters
    pub max_prompt_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or tracing filter directive
    pub level: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vidu.com".to_string(),
            api_key: None,
            model: "vidu-2.0".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            status_timeout_seconds: 10,
            progress_increment: 5,
            progress_ceiling: 90,
            initial_progress: 30,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024, // 5MB
            max_prompt_chars: 1000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = [
            "vidu-animator.toml",
            "config/vidu-animator.toml",
            "/etc/vidu-animator/config.toml",
        ];

        let mut config: Option<Config> = None;
        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(parsed) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = Some(parsed);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(api_key) = std::env::var("VIDU_API_KEY") {
            if !api_key.trim().is_empty() {
                self.provider.api_key = Some(api_key);
            }
        }

        if let Ok(base_url) = std::env::var("VIDU_BASE_URL") {
            self.provider.base_url = base_url;
        }

        if let Ok(model) = std::env::var("VIDU_MODEL") {
            self.provider.model = model;
        }

        if let Ok(interval) = std::env::var("VIDU_POLL_INTERVAL_MS") {
            self.polling.interval_ms = interval.parse().unwrap_or(self.polling.interval_ms);
        }

        if let Ok(port) = std::env::var("VIDU_ANIMATOR_PORT") {
            self.server.port = port.parse().unwrap_or(self.server.port);
        }

        if let Ok(log_level) = std::env::var("VIDU_ANIMATOR_LOG_LEVEL") {
            self.logging.level = log_level;
        }
    }

    /// Save configuration to file. The API key is never written out.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut redacted = self.clone();
        redacted.provider.api_key = None;
        let config_str = toml::to_string_pretty(&redacted)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.provider.base_url()?;

        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model must not be empty".to_string()));
        }

        if self.polling.interval_ms == 0 {
            return Err(ConfigError::Invalid("polling.interval_ms must be greater than 0".to_string()));
        }

        if self.polling.status_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "polling.status_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.polling.progress_ceiling > 100 || self.polling.initial_progress > self.polling.progress_ceiling {
            return Err(ConfigError::Invalid(
                "polling progress values must satisfy initial <= ceiling <= 100".to_string(),
            ));
        }

        if self.upload.max_image_bytes == 0 || self.upload.max_prompt_chars == 0 {
            return Err(ConfigError::Invalid("upload limits must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Validate and also require a provider credential
    pub fn require_api_key(&self) -> Result<&str> {
        self.provider
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("VIDU_API_KEY is not set".to_string()))
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Vidu Animator Configuration:\n\
            - Provider: {}\n\
            - Model: {}\n\
            - API Key: {}\n\
            - Poll Interval: {}ms\n\
            - Status Timeout: {}s\n\
            - Max Image Size: {} bytes\n\
            - Listen: {}:{}",
            self.provider.base_url,
            self.provider.model,
            if self.provider.api_key.is_some() { "set" } else { "missing" },
            self.polling.interval_ms,
            self.polling.status_timeout_seconds,
            self.upload.max_image_bytes,
            self.server.host,
            self.server.port
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.provider.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.provider.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.provider.model = model.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.polling.interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_status_timeout(mut self, seconds: u64) -> Self {
        self.config.polling.status_timeout_seconds = seconds;
        self
    }

    pub fn with_max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.upload.max_image_bytes = bytes;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.base_url, "https://api.vidu.com");
        assert_eq!(config.provider.model, "vidu-2.0");
        assert_eq!(config.polling.interval(), Duration::from_secs(3));
        assert_eq!(config.polling.status_timeout(), Duration::from_secs(10));
        assert_eq!(config.upload.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.upload.max_prompt_chars, 1000);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_api_key("secret")
            .with_model("vidu-q1")
            .with_poll_interval(Duration::from_millis(250))
            .with_max_image_bytes(1024)
            .with_port(8080)
            .build();

        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.provider.model, "vidu-q1");
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.upload.max_image_bytes, 1024);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_without_config_file() {
        // No candidate file exists in the crate root, so defaults plus env win
        let config = Config::load().unwrap();
        assert_eq!(config.polling.progress_ceiling, 90);
        assert_eq!(config.upload.max_prompt_chars, 1000);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let config = ConfigBuilder::new().with_base_url("not a url").build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let config = ConfigBuilder::new().with_poll_interval(Duration::ZERO).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let config = ConfigBuilder::new().build();
        assert!(config.require_api_key().is_err());
        let config = ConfigBuilder::new().with_api_key("k").build();
        assert_eq!(config.require_api_key().unwrap(), "k");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ConfigBuilder::new().with_api_key("super-secret").build();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vidu-animator.toml");
        std::fs::write(&path, "[polling]\ninterval_ms = 500\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.polling.interval_ms, 500);
        assert_eq!(config.polling.progress_ceiling, 90);
        assert_eq!(config.provider.model, "vidu-2.0");
    }

    #[test]
    fn test_save_redacts_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.toml");
        let config = ConfigBuilder::new().with_api_key("super-secret").build();
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("super-secret"));
        assert!(written.contains("vidu-2.0"));
    }
}
