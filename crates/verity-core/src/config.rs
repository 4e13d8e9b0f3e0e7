//! Client configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CoreError;

/// Full configuration for a Verity client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerityConfig {
    /// Registry / storage backend settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Verification pipeline settings.
    #[serde(default)]
    pub verifier: VerifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds (doubles per retry).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Deadline for a whole `verify` call in milliseconds.
    #[serde(default = "default_verify_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether a failed content match makes the verdict negative.
    #[serde(default)]
    pub require_content_match: bool,
}

// Default value functions
fn default_base_url() -> String {
    "http://127.0.0.1:8000".into()
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    2_000
}
fn default_verify_timeout_ms() -> u64 {
    15_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_verify_timeout_ms(),
            require_content_match: false,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl VerifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl VerityConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields and for a missing file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<VerityConfig>(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.registry.base_url.trim().is_empty() {
            return Err(CoreError::Config("registry.base_url is empty".into()));
        }
        if self.registry.max_attempts == 0 {
            return Err(CoreError::Config(
                "registry.max_attempts must be at least 1".into(),
            ));
        }
        if self.registry.timeout_ms == 0 || self.verifier.timeout_ms == 0 {
            return Err(CoreError::Config("timeouts must be non-zero".into()));
        }
        if self.registry.max_delay_ms < self.registry.base_delay_ms {
            return Err(CoreError::Config(
                "registry.max_delay_ms must not be below base_delay_ms".into(),
            ));
        }
        Ok(())
    }
}
