//! Service state definitions.

use std::fmt;

/// Service operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Components are wired but the scheduler is not running.
    Starting,
    /// The scheduler is running and reads are served.
    Running,
    /// Shutdown requested; the in-flight cycle is finishing.
    ShuttingDown,
    /// The scheduler has exited.
    Stopped,
}

impl ServiceState {
    /// Check if the service is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Check if the service is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::ShuttingDown => "shutting_down",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
