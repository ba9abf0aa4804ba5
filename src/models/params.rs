//! Declarative launch parameters supplied by the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// How the session is executed: a plain run or a debug run that also
/// opens a debugger-attach port.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Normal run; only the runtime-service port is opened.
    #[default]
    Run,
    /// Debug run; a debugger-attach port is opened as well.
    Debug,
}

/// Parameters for one child-process launch. Treated as immutable once
/// [`LaunchParameters::validate`] has passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LaunchParameters {
    /// Path to the runtime executable.
    pub executable: PathBuf,
    /// Working directory for the child; defaults to the target file's
    /// parent when unset.
    pub working_dir: Option<PathBuf>,
    /// Environment overrides applied on top of (or instead of) the
    /// inherited environment.
    pub env: HashMap<String, String>,
    /// Whether the child inherits the launcher's environment.
    pub include_parent_env: bool,
    /// Raw VM-option string, tokenized shell-style at build time.
    pub vm_options: String,
    /// Raw program-argument string, tokenized the same way.
    pub program_args: String,
    /// Script or program file handed to the runtime.
    pub target_file: PathBuf,
    /// Enable the runtime's checked/strict mode.
    pub checked_mode: bool,
    /// Plain run versus debug run.
    pub executor: ExecutorKind,
}

impl LaunchParameters {
    /// Construct parameters for a plain run of `target_file` under
    /// `executable`, with defaults for everything else.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, target_file: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
            env: HashMap::new(),
            include_parent_env: true,
            vm_options: String::new(),
            program_args: String::new(),
            target_file: target_file.into(),
            checked_mode: false,
            executor: ExecutorKind::Run,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the raw VM-option string.
    #[must_use]
    pub fn with_vm_options(mut self, options: impl Into<String>) -> Self {
        self.vm_options = options.into();
        self
    }

    /// Set the raw program-argument string.
    #[must_use]
    pub fn with_program_args(mut self, args: impl Into<String>) -> Self {
        self.program_args = args.into();
        self
    }

    /// Toggle checked/strict mode.
    #[must_use]
    pub fn with_checked_mode(mut self, checked: bool) -> Self {
        self.checked_mode = checked;
        self
    }

    /// Select the executor kind.
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.executor = executor;
        self
    }

    /// Add a single environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Control inheritance of the launcher's environment.
    #[must_use]
    pub fn with_include_parent_env(mut self, include: bool) -> Self {
        self.include_parent_env = include;
        self
    }

    /// Whether this launch wants a debugger-attach port.
    #[must_use]
    pub fn wants_debug(&self) -> bool {
        self.executor == ExecutorKind::Debug
    }

    /// Working directory the child actually runs in: the explicit
    /// directory when set, otherwise the target file's parent.
    #[must_use]
    pub fn resolved_working_dir(&self) -> PathBuf {
        if let Some(dir) = &self.working_dir {
            return dir.clone();
        }
        self.target_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// Check the parameters before any port or process action.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SdkNotConfigured` when the executable path is
    /// empty and `AppError::Validation` when the target file path is empty.
    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(AppError::SdkNotConfigured(
                "no runtime executable supplied".into(),
            ));
        }
        if self.target_file.as_os_str().is_empty() {
            return Err(AppError::Validation("target file path is empty".into()));
        }
        Ok(())
    }
}
