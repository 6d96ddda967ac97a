use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ConfigError;

/// env var pointing to registry config file
pub const REGISTRY_CONFIG_ENV: &str = "K8_REGISTRY_CONFIG";

pub const DEFAULT_PREFIX: &str = "/registry";
/// number of raw events kept for replaying watches
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// root of all registry keys
    pub prefix: String,
    /// raw events retained for watch replay
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateConfig {
    /// read-modify-write attempts before giving up with a conflict
    pub max_attempts: u32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    #[serde(skip)]
    pub path: Option<PathBuf>,
    pub storage: StorageConfig,
    pub update: UpdateConfig,
    /// deadline for a single store call when caller doesn't supply one
    pub request_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            storage: StorageConfig::default(),
            update: UpdateConfig::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl RegistryConfig {
    /// load from file named by env var, then from home directory.
    /// if neither exists, defaults are used
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(REGISTRY_CONFIG_ENV) {
            return Self::from_file(path);
        }

        let path = Self::home_path()?;
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("no registry config found, using defaults");
            Ok(Self::default())
        }
    }

    fn home_path() -> Result<PathBuf, ConfigError> {
        let home_dir = home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home_dir.join(".k8-registry").join("config.yaml"))
    }

    /// read from default home directory
    pub fn from_home() -> Result<Self, ConfigError> {
        Self::from_file(Self::home_path()?)
    }

    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        debug!(path = %path.as_ref().display(), "reading registry config");
        let file = File::open(path.as_ref())?;
        let mut config: Self = serde_yaml::from_reader(file)?;
        config.path = Some(path.as_ref().to_path_buf());
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<T: AsRef<Path>>(&self, path: T) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        Ok(serde_yaml::to_writer(file, self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "storage prefix must start with '/': {}",
                self.storage.prefix
            )));
        }
        if self.storage.prefix.len() > 1 && self.storage.prefix.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "storage prefix must not end with '/': {}",
                self.storage.prefix
            )));
        }
        if self.update.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "update max attempts must be at least 1".to_owned(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request timeout must be at least 1ms".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn set_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.storage.prefix = prefix.into();
        self
    }

    pub fn set_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn set_max_update_attempts(mut self, attempts: u32) -> Self {
        self.update.max_attempts = attempts;
        self
    }
}
