use crate::readiness::{DEFAULT_ATTEMPTS, DEFAULT_INTERVAL_SECS};
use crate::CoreError;
use berth_host::ContainerEngine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "berth.toml";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Deployment settings read from `berth.toml`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default = "default_engine")]
    pub engine: ContainerEngine,
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReadinessConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Containers that must report running after start or restart.
    #[serde(default)]
    pub containers: Vec<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            compose_file: default_compose_file(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_secs: default_interval_secs(),
            containers: Vec::new(),
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_engine() -> ContainerEngine {
    ContainerEngine::Docker
}

fn default_compose_file() -> PathBuf {
    PathBuf::from(DEFAULT_COMPOSE_FILE)
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl DeployConfig {
    pub fn parse_str(input: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse_str(&content)
    }

    /// Load `path` when it exists. A missing file is only an error when the
    /// caller named it explicitly.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self, CoreError> {
        if !explicit && !path.exists() {
            tracing::debug!("no {} found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.compose_file.as_os_str().is_empty() {
            return Err(CoreError::Config("compose_file must not be empty".to_owned()));
        }
        if self.readiness.attempts == 0 {
            return Err(CoreError::Config(
                "readiness.attempts must be at least 1".to_owned(),
            ));
        }
        if let Some(empty) = self.readiness.containers.iter().find(|c| c.trim().is_empty()) {
            return Err(CoreError::Config(format!(
                "readiness.containers contains an empty name: '{empty}'"
            )));
        }
        Ok(())
    }
}
