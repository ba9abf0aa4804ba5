//! Session status model and registry record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ports::AllocatedPorts;

/// Lifecycle status for a launched session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Ports reserved, child process not yet created.
    Starting,
    /// Child process is alive.
    Running,
    /// Child process exited; `exit_code` is `None` when the process was
    /// killed by a signal and no code was reported.
    Terminated {
        /// Exit code passed through verbatim.
        exit_code: Option<i32>,
    },
    /// The OS could not create the child process.
    FailedToStart,
}

impl SessionStatus {
    /// Whether the session still holds its port reservations.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether the session reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Running | Self::FailedToStart)
                | (Self::Starting | Self::Running, Self::Terminated { .. })
        )
    }
}

/// Registry record for one session: identity, ports, and lifecycle state.
///
/// Terminal records keep their entry (for exit-code lookup) until the
/// caller explicitly reaps them; their ports are already reusable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionRecord {
    /// Unique session identifier.
    pub id: String,
    /// Ports reserved for this session.
    pub ports: AllocatedPorts,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Construct a fresh `Starting` record.
    #[must_use]
    pub fn new(id: String, ports: AllocatedPorts) -> Self {
        Self {
            id,
            ports,
            status: SessionStatus::Starting,
            created_at: Utc::now(),
        }
    }
}
