use crate::controls::{Controls, MAX_SEND_DELAY_MS};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up when no explicit config path is given.
pub const CONFIG_FILE_NAME: &str = "gameapi-harness.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// HarnessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Initial values of the live operator controls.
    #[serde(default)]
    pub controls: Controls,
    /// Seed for forced-action selection and sample generation. Unset means
    /// a fresh seed per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl HarnessConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: HarnessConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.controls.send_delay_ms > MAX_SEND_DELAY_MS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "controls.send_delay_ms={} exceeds the maximum of {MAX_SEND_DELAY_MS}",
                    self.controls.send_delay_ms
                ),
            });
        }

        if self.server.host.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "server.host is empty".to_string(),
            });
        }

        if self.server.port == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.port=0 lets the OS pick a port; games usually expect a fixed one"
                    .to_string(),
            });
        }

        if self.controls.auto_send && self.controls.ignore_forced_actions {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "controls.auto_send has no effect while ignore_forced_actions is set"
                    .to_string(),
            });
        }

        warnings
    }
}
