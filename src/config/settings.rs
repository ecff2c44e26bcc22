//! Tool settings: defaults, optional TOML file, environment overrides.

use super::RetryConfig;
use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production endpoint of the Android Publisher API
pub const DEFAULT_API_BASE_URL: &str = "https://androidpublisher.googleapis.com";

/// Settings shared by every publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the publishing API (scheme and host)
    pub api_base_url: String,
    /// Timeout for ordinary JSON requests
    pub request_timeout_secs: u64,
    /// Timeout for the bundle upload
    pub upload_timeout_secs: u64,
    /// Directory holding per-package lock files
    pub lock_dir: Option<PathBuf>,
    /// How long to wait for another publish of the same package
    pub lock_timeout_ms: u64,
    /// Retry limits
    pub retry: RetryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 60,
            upload_timeout_secs: 900,
            lock_dir: None,
            lock_timeout_ms: 5000,
            retry: RetryConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_from(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Read a TOML settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PublishError::config(format!("cannot read settings file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            PublishError::Configuration { reason } => {
                PublishError::config(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Parse settings from TOML text; missing keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| PublishError::config(format!("invalid settings: {}", e.message())))
    }

    /// Override fields from environment variables found through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PLAY_API_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(dir) = lookup("PLAY_LOCK_DIR").filter(|d| !d.trim().is_empty()) {
            self.lock_dir = Some(PathBuf::from(dir));
        }
        self.retry.apply_env_from(&lookup);
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://")
        {
            return Err(PublishError::config(format!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 || self.upload_timeout_secs == 0 {
            return Err(PublishError::config("timeouts cannot be zero"));
        }
        self.retry.validate()
    }

    /// Timeout for JSON requests
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for the bundle upload
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Lock wait budget
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Lock directory, defaulting to the user cache dir
    pub fn resolved_lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("play_publisher")
                .join("locks")
        })
    }
}
