//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all launch failure modes.
///
/// A child process exiting (even with a non-zero code) is not an error;
/// exits are reported through the session status channel instead.
#[derive(Debug)]
pub enum AppError {
    /// Launch parameters are missing or invalid (e.g. empty target path).
    Validation(String),
    /// No runtime executable was supplied or configured.
    SdkNotConfigured(String),
    /// The port allocator exhausted its probe attempts.
    NoPortAvailable(String),
    /// The OS could not start the child process (missing binary,
    /// permission denied). Distinct from a later runtime crash.
    ProcessLaunch(String),
    /// Requested session does not exist in the registry.
    NotFound(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::SdkNotConfigured(msg) => write!(f, "sdk not configured: {msg}"),
            Self::NoPortAvailable(msg) => write!(f, "no port available: {msg}"),
            Self::ProcessLaunch(msg) => write!(f, "process launch: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
