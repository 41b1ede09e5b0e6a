//! Configuration for authorization gates
//!
//! A gate needs very little: a name used in logs and events, and an optional
//! per-attempt timeout.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Name used when none is configured.
pub const DEFAULT_GATE_NAME: &str = "authorization";

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Name recorded on spans and events
    pub name: String,

    /// Upper bound for a single attempt; a round that exceeds it fails
    pub attempt_timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_GATE_NAME.to_string(),
            attempt_timeout: None,
        }
    }
}

/// Configuration builder
pub struct ConfigBuilder {
    config: GateConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GateConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> GateConfig {
        self.config
    }
}

/// Load configuration from environment variables
///
/// `AUTHGATE_NAME` sets the gate name, `AUTHGATE_TIMEOUT_MS` the attempt
/// timeout in milliseconds. Empty names, `0`, and unparseable values are
/// ignored.
pub fn from_env() -> GateConfig {
    let mut config = GateConfig::default();

    if let Ok(name) = std::env::var("AUTHGATE_NAME") {
        if !name.is_empty() {
            config.name = name;
        }
    }

    if let Ok(timeout) = std::env::var("AUTHGATE_TIMEOUT_MS") {
        match timeout.parse::<u64>() {
            Ok(0) | Err(_) => {}
            Ok(ms) => config.attempt_timeout = Some(Duration::from_millis(ms)),
        }
    }

    config
}

/// Load configuration from a TOML file
pub fn from_file(path: impl AsRef<Path>) -> Result<GateConfig> {
    let contents = std::fs::read_to_string(path)?;
    from_toml_str(&contents)
}

/// Parse configuration from TOML text
pub fn from_toml_str(contents: &str) -> Result<GateConfig> {
    let config: GateConfig = toml::from_str(contents)?;
    Ok(config)
}
