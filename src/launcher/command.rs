//! Deterministic child-process command construction.
//!
//! The argv produced here is the wire format to the external runtime:
//! flag names and ordering are part of the contract because the runtime
//! is flag-order sensitive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shlex::Shlex;

use crate::models::params::LaunchParameters;
use crate::Result;

/// Tells the runtime to skip flags it does not recognize.
const IGNORE_UNRECOGNIZED_FLAGS: &str = "--ignore-unrecognized-flags";
/// Checked/strict-mode flag.
const CHECKED_MODE: &str = "--checked";
/// Package-root flag prefix; the resolved path is appended.
const PACKAGE_ROOT_PREFIX: &str = "--package-root=";
/// Debugger-attach port flag prefix.
const DEBUG_PORT_PREFIX: &str = "--debug:";
/// Pauses new isolates at spawn so the debugger can attach first.
const BREAK_AT_ISOLATE_SPAWN: &str = "--break-at-isolate-spawn";
/// Runtime-service port flag prefix.
const VM_SERVICE_PREFIX: &str = "--enable-vm-service:";
/// Emits service pause events; always passed alongside the service port.
const TRACE_SERVICE_PAUSE_EVENTS: &str = "--trace_service_pause_events";

/// Resolves the package root for a target file. Implemented by an
/// external path-resolution collaborator; a `None` result degrades
/// gracefully by omitting the package-root flag.
pub trait PackageRootResolver: Send + Sync {
    /// Resolve the package root for `target`, if one applies.
    fn resolve_package_root(&self, target: &Path) -> Option<PathBuf>;
}

/// Resolver that never yields a package root.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPackageRoot;

impl PackageRootResolver for NoPackageRoot {
    fn resolve_package_root(&self, _target: &Path) -> Option<PathBuf> {
        None
    }
}

/// Fully resolved invocation for one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Runtime executable path.
    pub exe: PathBuf,
    /// Working directory the child runs in.
    pub work_dir: PathBuf,
    /// Environment overrides.
    pub env: HashMap<String, String>,
    /// When true, the inherited environment is dropped before applying
    /// the overrides.
    pub clear_env: bool,
    /// Ordered argument vector.
    pub args: Vec<String>,
}

/// Builds [`LaunchCommand`]s from declarative parameters plus the
/// already-reserved ports.
pub struct CommandBuilder {
    resolver: Arc<dyn PackageRootResolver>,
}

impl CommandBuilder {
    /// Create a builder with the given package-root resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn PackageRootResolver>) -> Self {
        Self { resolver }
    }

    /// Build the concrete invocation.
    ///
    /// Argument order: compatibility flag, tokenized VM options, checked
    /// mode, package root, debug port pair, service port pair, target
    /// file, tokenized program arguments.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SdkNotConfigured` when no executable is supplied
    /// and `AppError::Validation` when the target file path is empty.
    pub fn build(
        &self,
        params: &LaunchParameters,
        debug_port: Option<u16>,
        service_port: u16,
    ) -> Result<LaunchCommand> {
        params.validate()?;

        let mut args = Vec::new();
        args.push(IGNORE_UNRECOGNIZED_FLAGS.to_owned());
        args.extend(tokenize(&params.vm_options));

        if params.checked_mode {
            args.push(CHECKED_MODE.to_owned());
        }

        if let Some(package_root) = self.resolver.resolve_package_root(&params.target_file) {
            if !package_root.as_os_str().is_empty() {
                args.push(format!(
                    "{PACKAGE_ROOT_PREFIX}{}",
                    package_root.to_string_lossy()
                ));
            }
        }

        if let Some(port) = debug_port {
            args.push(format!("{DEBUG_PORT_PREFIX}{port}"));
            args.push(BREAK_AT_ISOLATE_SPAWN.to_owned());
        }

        args.push(format!("{VM_SERVICE_PREFIX}{service_port}"));
        args.push(TRACE_SERVICE_PAUSE_EVENTS.to_owned());

        args.push(params.target_file.to_string_lossy().into_owned());
        args.extend(tokenize(&params.program_args));

        Ok(LaunchCommand {
            exe: params.executable.clone(),
            work_dir: params.resolved_working_dir(),
            env: params.env.clone(),
            clear_env: !params.include_parent_env,
            args,
        })
    }
}

/// Shell-lite tokenization: whitespace-separated runs are tokens, quoted
/// runs (including internal spaces) are single tokens.
#[must_use]
pub fn tokenize(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    Shlex::new(raw).collect()
}
