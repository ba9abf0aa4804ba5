//! Allocated port pair handed to external tooling.

use serde::{Deserialize, Serialize};

/// Port returned by the `-1`-when-unset accessors.
const UNSET: i32 = -1;

/// Ports allocated for one session, set exactly once before process start
/// and never mutated afterwards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AllocatedPorts {
    /// TCP port a debugger client attaches to; absent for plain runs.
    pub debug: Option<u16>,
    /// TCP port exposing the runtime introspection service.
    pub service: Option<u16>,
}

impl AllocatedPorts {
    /// Debugger-attach port, or `-1` if unset. This is the contract
    /// external debugger/UI collaborators consume.
    #[must_use]
    pub fn debug_port(self) -> i32 {
        self.debug.map_or(UNSET, i32::from)
    }

    /// Runtime-service port, or `-1` if unset.
    #[must_use]
    pub fn service_port(self) -> i32 {
        self.service.map_or(UNSET, i32::from)
    }

    /// Iterate over the ports that are actually set.
    #[must_use]
    pub fn assigned(self) -> impl Iterator<Item = u16> {
        self.debug.into_iter().chain(self.service)
    }
}
