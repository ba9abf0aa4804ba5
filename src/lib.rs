#![forbid(unsafe_code)]

//! `launchport` — launcher and session manager for instrumented subprocesses.
//!
//! Starts an external runtime as a child process with a negotiated
//! debugger-attach port and a runtime-service (introspection) port,
//! guarantees port uniqueness across concurrent launches, and exposes
//! both ports plus the live output stream for the process's lifetime.

pub mod config;
pub mod errors;
pub mod launcher;
pub mod models;

pub use config::LauncherConfig;
pub use errors::{AppError, Result};
