//! Session configuration
//!
//! One `SessionConfig` describes one device + app pair. It is frozen once a
//! session opens: the session only hands out `&SessionConfig`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local id used in logs and events
    pub id: String,

    /// Automation server endpoint
    pub server_url: String,

    pub platform_name: String,
    pub platform_version: String,

    /// Physical device serial
    pub udid: Option<String>,

    /// Device class or emulator name, used when no udid is pinned
    pub device_name: Option<String>,

    /// Automation engine, e.g. UiAutomator2
    pub automation_name: String,

    pub app_package: String,

    /// Entry-point activity
    pub app_activity: String,

    /// Keep app data between sessions
    pub no_reset: bool,

    pub auto_grant_permissions: bool,

    /// Upper bound for bringing the app to the foreground
    pub launch_timeout_ms: u64,

    /// Upper bound for a single wire request
    pub request_timeout_ms: u64,

    pub wait: WaitSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            server_url: "http://localhost:4723".to_string(),
            platform_name: "Android".to_string(),
            platform_version: String::new(),
            udid: None,
            device_name: None,
            automation_name: "UiAutomator2".to_string(),
            app_package: String::new(),
            app_activity: String::new(),
            no_reset: true,
            auto_grant_permissions: false,
            launch_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            wait: WaitSettings::default(),
        }
    }
}

/// Wait preset durations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// Transient UI feedback
    pub default_timeout_ms: u64,

    /// Network-bound content such as ad-gated rewards
    pub extended_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            extended_timeout_ms: 60_000,
            poll_interval_ms: 200,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint()?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "server_url must be http(s): {}",
                self.server_url
            )));
        }

        for (name, value) in [
            ("platform_name", &self.platform_name),
            ("automation_name", &self.automation_name),
            ("app_package", &self.app_package),
            ("app_activity", &self.app_activity),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} is required", name)));
            }
        }

        if self.udid.is_none() && self.device_name.is_none() {
            return Err(ConfigError::Invalid(
                "either udid or device_name is required".to_string(),
            ));
        }

        if self.wait.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "wait.poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.server_url)
            .map_err(|e| ConfigError::Invalid(format!("server_url {:?}: {}", self.server_url, e)))
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Capabilities for new-session negotiation
    pub fn capabilities(&self) -> Value {
        let mut caps = Map::new();
        caps.insert("platformName".into(), json!(self.platform_name));
        if !self.platform_version.is_empty() {
            caps.insert("appium:platformVersion".into(), json!(self.platform_version));
        }
        if let Some(udid) = &self.udid {
            caps.insert("appium:udid".into(), json!(udid));
        }
        if let Some(device_name) = &self.device_name {
            caps.insert("appium:deviceName".into(), json!(device_name));
        }
        caps.insert("appium:automationName".into(), json!(self.automation_name));
        caps.insert("appium:appPackage".into(), json!(self.app_package));
        caps.insert("appium:appActivity".into(), json!(self.app_activity));
        caps.insert("appium:noReset".into(), json!(self.no_reset));
        caps.insert(
            "appium:autoGrantPermissions".into(),
            json!(self.auto_grant_permissions),
        );
        Value::Object(caps)
    }
}
