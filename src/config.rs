//! Launcher configuration parsing and validation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_graceful_timeout_seconds() -> u64 {
    5
}

fn default_port_probe_attempts() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

/// Launcher configuration parsed from `launchport.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LauncherConfig {
    /// Path to the runtime executable (the VM binary). Sessions started
    /// without an executable override fail with `SdkNotConfigured` when
    /// this is absent.
    #[serde(default)]
    pub runtime_exe: Option<PathBuf>,
    /// Raw VM-option string prepended to every launch.
    #[serde(default)]
    pub vm_options: String,
    /// Environment overrides applied to every child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether child processes inherit the launcher's environment.
    #[serde(default = "default_true")]
    pub include_parent_env: bool,
    /// Whether to pass the checked/strict-mode flag by default.
    #[serde(default)]
    pub checked_mode: bool,
    /// Seconds to wait for a graceful exit before force-killing.
    #[serde(default = "default_graceful_timeout_seconds")]
    pub graceful_timeout_seconds: u64,
    /// Upper bound on OS port probes per allocation.
    #[serde(default = "default_port_probe_attempts")]
    pub port_probe_attempts: u32,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            runtime_exe: None,
            vm_options: String::new(),
            env: HashMap::new(),
            include_parent_env: true,
            checked_mode: false,
            graceful_timeout_seconds: default_graceful_timeout_seconds(),
            port_probe_attempts: default_port_probe_attempts(),
        }
    }
}

impl LauncherConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Bounded wait before a graceful termination escalates to a kill.
    #[must_use]
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.port_probe_attempts == 0 {
            return Err(AppError::Config(
                "port_probe_attempts must be greater than zero".into(),
            ));
        }
        if self.graceful_timeout_seconds == 0 {
            return Err(AppError::Config(
                "graceful_timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
