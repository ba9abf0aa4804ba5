//! Launch orchestration modules.
//!
//! Covers port allocation, deterministic command construction, process
//! session lifecycle, the process-wide session registry, and the console
//! output plumbing.

pub mod command;
pub mod filter;
pub mod output;
pub mod ports;
pub mod registry;
pub mod session;
