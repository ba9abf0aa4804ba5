//! Process-wide table of active sessions.
//!
//! The registry owns the port allocator and serializes the whole
//! "compute exclude set / reserve / register" sequence under one lock, so
//! two concurrent session starts can never observe and claim the same
//! port. It is an explicit object injected into sessions rather than
//! ambient global state.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::launcher::ports::PortAllocator;
use crate::models::ports::AllocatedPorts;
use crate::models::session::{SessionRecord, SessionStatus};
use crate::{AppError, Result};

/// Registry of sessions keyed by session id.
pub struct SessionRegistry {
    allocator: PortAllocator,
    entries: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    /// Create a registry backed by the given allocator.
    #[must_use]
    pub fn new(allocator: PortAllocator) -> Self {
        Self {
            allocator,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve ports for a new session and register it as `Starting`,
    /// all under a single lock acquisition.
    ///
    /// The exclude set starts as the union of all live sessions' ports;
    /// the debug port (when requested) is added to it before the service
    /// port is reserved, so the two can never collide regardless of
    /// allocation order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoPortAvailable` when a reservation fails; in
    /// that case nothing was registered and no port is leaked.
    pub fn allocate_and_register(&self, id: &str, want_debug: bool) -> Result<AllocatedPorts> {
        let mut entries = self.lock();

        let mut exclude: HashSet<u16> = entries
            .values()
            .filter(|record| record.status.is_live())
            .flat_map(|record| record.ports.assigned())
            .collect();

        let debug = if want_debug {
            let port = self.allocator.reserve(&exclude)?;
            exclude.insert(port);
            Some(port)
        } else {
            None
        };
        let service = self.allocator.reserve(&exclude)?;

        let ports = AllocatedPorts {
            debug,
            service: Some(service),
        };
        entries.insert(id.to_owned(), SessionRecord::new(id.to_owned(), ports));

        info!(
            session_id = id,
            debug_port = ports.debug_port(),
            service_port = ports.service_port(),
            "ports reserved"
        );
        Ok(ports)
    }

    /// Transition a registered session to a new status.
    ///
    /// Terminal transitions free the session's ports for future
    /// allocations while keeping the record for lookup until reaped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id and
    /// `AppError::Validation` for a transition the lifecycle forbids.
    pub fn update_status(&self, id: &str, next: SessionStatus) -> Result<()> {
        let mut entries = self.lock();
        let record = entries
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id} not registered")))?;
        if !record.status.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "invalid session transition: {:?} -> {next:?}",
                record.status
            )));
        }
        record.status = next;
        Ok(())
    }

    /// Remove a session entry, releasing its ports immediately. Used when
    /// process creation fails after ports were tentatively reserved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub fn unregister(&self, id: &str) -> Result<()> {
        let mut entries = self.lock();
        entries
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id} not registered")))?;
        info!(session_id = id, "session unregistered");
        Ok(())
    }

    /// Union of all ports belonging to non-terminated sessions. This is
    /// the exclude set future allocations must honor.
    #[must_use]
    pub fn active_ports(&self) -> HashSet<u16> {
        self.lock()
            .values()
            .filter(|record| record.status.is_live())
            .flat_map(|record| record.ports.assigned())
            .collect()
    }

    /// Look up a session record by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub fn lookup(&self, id: &str) -> Result<SessionRecord> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {id} not registered")))
    }

    /// Remove all terminal records, returning the reaped ids.
    #[must_use]
    pub fn reap_terminated(&self) -> Vec<String> {
        let mut entries = self.lock();
        let reaped: Vec<String> = entries
            .iter()
            .filter(|(_, record)| record.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &reaped {
            entries.remove(id);
        }
        reaped
    }

    /// Number of registered sessions, terminal records included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry holds no sessions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
