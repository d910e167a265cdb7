//! Spawns the application, watches its output for readiness and owns its
//! shutdown.

mod forwarder;
mod process;
mod signal;

use std::fmt;
use std::time::Duration;

pub use forwarder::StreamKind;
pub use process::{ProcessExit, ProcessSupervisor, SupervisedProcess};

/// Pause before the shutdown hook starts stopping the child, so the host's
/// own shutdown logging gets out first.
pub const SHUTDOWN_HOOK_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle of one supervised process.
///
/// `Idle -> Spawning -> AwaitingReadiness -> {Running | Failed}`,
/// `Running -> Stopping -> {Stopped | Failed}`. `Stopping` may also be
/// entered from `AwaitingReadiness`. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Spawning,
    AwaitingReadiness,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Idle => write!(f, "idle"),
            ProcessState::Spawning => write!(f, "spawning"),
            ProcessState::AwaitingReadiness => write!(f, "awaiting readiness"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Failed => write!(f, "failed"),
        }
    }
}

/// Output lines that decide whether startup succeeded. Matching is by
/// substring; the first decisive line wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessProbe {
    pub ready_marker: String,
    pub error_markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    pub readiness_timeout: Duration,
    pub grace_period: Duration,
    pub probe: ReadinessProbe,
}
