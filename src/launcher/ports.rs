//! Free-port probing for session debug and service endpoints.

use std::collections::HashSet;
use std::net::TcpListener;

use crate::{AppError, Result};

/// Default upper bound on OS probes per [`PortAllocator::reserve`] call.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 50;

/// Finds free local TCP ports, skipping ports the caller already claimed.
///
/// Each probe binds an ephemeral socket on loopback and releases it
/// immediately, so availability is re-checked at the OS level rather than
/// from bookkeeping alone. The released port can still be raced by other
/// OS processes; this is best-effort, not a hard guarantee.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    max_attempts: u32,
}

impl PortAllocator {
    /// Create an allocator with the given probe bound.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Reserve one free port that is not in `exclude`.
    ///
    /// `exclude` must contain every port belonging to a non-terminated
    /// session plus any port the caller already allocated for the same
    /// session, so a second reservation never collides with the first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoPortAvailable` when the OS cannot supply an
    /// acceptable ephemeral port within the attempt bound.
    #[allow(clippy::implicit_hasher)]
    pub fn reserve(&self, exclude: &HashSet<u16>) -> Result<u16> {
        for _ in 0..self.max_attempts {
            let listener = match TcpListener::bind(("127.0.0.1", 0)) {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::warn!(%err, "port probe bind failed");
                    continue;
                }
            };
            let port = listener.local_addr()?.port();
            // Probe socket released here; the port stays free for the child.
            drop(listener);
            if !exclude.contains(&port) {
                return Ok(port);
            }
        }
        Err(AppError::NoPortAvailable(format!(
            "no free port after {} attempts",
            self.max_attempts
        )))
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ATTEMPTS)
    }
}
