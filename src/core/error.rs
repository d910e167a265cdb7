use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::maven::MavenArtifact;

/// Central error type for the entire orchestrator.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    #[error("POM parse error: {0}")]
    PomParse(String),

    #[error(
        "could not determine/resolve runtime dependencies; unresolved: {}",
        join_artifacts(.unresolved)
    )]
    Resolution { unresolved: Vec<MavenArtifact> },

    // ── Catalog ─────────────────────────────────────────
    #[error("Module catalog could not be loaded: {0}")]
    CatalogLoad(String),

    #[error("Module catalog is inconsistent: dependency cycle through {}", .cycle.join(" -> "))]
    CatalogIntegrity { cycle: Vec<String> },

    #[error("Module not found in catalog: {group}:{name}")]
    ModuleNotFound { group: String, name: String },

    // ── Analysis ────────────────────────────────────────
    #[error("Failed to scan {path:?} for module usage: {reason}")]
    Analysis { path: PathBuf, reason: String },

    // ── Launch configuration ────────────────────────────
    #[error("Unsupported packaging: {0}")]
    UnsupportedPackaging(String),

    // ── Process ─────────────────────────────────────────
    #[error("Failed to spawn {program:?}: {reason}")]
    Spawn { program: PathBuf, reason: String },

    #[error(transparent)]
    Process(#[from] ProcessFailure),

    #[error("Wait for the application process was interrupted")]
    InterruptedWait,

    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: LaunchPhase,
        source: Box<LauncherError>,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

fn join_artifacts(artifacts: &[MavenArtifact]) -> String {
    artifacts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures captured on a live process handle.
///
/// Cloneable so that `SupervisedProcess::get_error` can hand out copies while
/// the original stays recorded on the handle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessFailure {
    #[error("process did not become ready within the timeout window ({}s)", .timeout.as_secs())]
    DeployTimeout { timeout: Duration },

    #[error("application reported an internal error: {0}")]
    Internal(String),

    #[error("process exited with {status} before it was stopped")]
    Exited { status: String },
}

/// The launch phase an error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Analysis,
    Resolution,
    Configuration,
    Spawn,
    Readiness,
    Shutdown,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchPhase::Analysis => write!(f, "analysis"),
            LaunchPhase::Resolution => write!(f, "resolution"),
            LaunchPhase::Configuration => write!(f, "configuration"),
            LaunchPhase::Spawn => write!(f, "spawn"),
            LaunchPhase::Readiness => write!(f, "readiness"),
            LaunchPhase::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Coarse classification the hosting program reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Could not compute what to run.
    Unresolvable,
    /// Never started.
    NeverStarted,
    /// Started but never became ready.
    NeverReady,
    Interrupted,
    Other,
}

impl LauncherError {
    /// Attach the launch phase to an error. Already-phased errors keep their
    /// original phase.
    pub fn in_phase(self, phase: LaunchPhase) -> Self {
        match self {
            phased @ LauncherError::Phase { .. } => phased,
            other => LauncherError::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Classify the error into the cause categories exposed to the host.
    pub fn cause(&self) -> FailureCause {
        match self {
            LauncherError::Phase { source, .. } => source.cause(),
            LauncherError::CatalogLoad(_)
            | LauncherError::CatalogIntegrity { .. }
            | LauncherError::ModuleNotFound { .. }
            | LauncherError::Analysis { .. }
            | LauncherError::Resolution { .. }
            | LauncherError::InvalidMavenCoordinate(_)
            | LauncherError::UnsupportedPackaging(_) => FailureCause::Unresolvable,
            LauncherError::Spawn { .. } => FailureCause::NeverStarted,
            LauncherError::Process(_) => FailureCause::NeverReady,
            LauncherError::InterruptedWait => FailureCause::Interrupted,
            _ => FailureCause::Other,
        }
    }

    /// Phase recorded on the error, if any.
    pub fn phase(&self) -> Option<LaunchPhase> {
        match self {
            LauncherError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Extension used at phase boundaries: `op().await.phase(LaunchPhase::Spawn)?`.
pub trait PhaseExt<T> {
    fn phase(self, phase: LaunchPhase) -> LauncherResult<T>;
}

impl<T> PhaseExt<T> for LauncherResult<T> {
    fn phase(self, phase: LaunchPhase) -> LauncherResult<T> {
        self.map_err(|e| e.in_phase(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_lists_every_unresolved_coordinate() {
        let err = LauncherError::Resolution {
            unresolved: vec![
                MavenArtifact::parse("com.example:a:1.0").unwrap(),
                MavenArtifact::parse("com.example:b:2.0").unwrap(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("could not determine/resolve runtime dependencies"));
        assert!(message.contains("com.example:a:1.0@jar"));
        assert!(message.contains("com.example:b:2.0@jar"));
    }

    #[test]
    fn phase_context_is_kept_and_cause_is_classified_through_it() {
        let err = LauncherError::Spawn {
            program: PathBuf::from("/missing/java"),
            reason: "not found".into(),
        }
        .in_phase(LaunchPhase::Spawn)
        .in_phase(LaunchPhase::Readiness);

        assert_eq!(err.phase(), Some(LaunchPhase::Spawn));
        assert_eq!(err.cause(), FailureCause::NeverStarted);
        assert!(err.to_string().starts_with("spawn phase failed"));
    }

    #[test]
    fn deploy_timeout_is_never_ready() {
        let err = LauncherError::from(ProcessFailure::DeployTimeout {
            timeout: Duration::from_secs(120),
        });
        assert_eq!(err.cause(), FailureCause::NeverReady);
        assert!(err
            .to_string()
            .contains("process did not become ready within the timeout window"));
    }

    #[test]
    fn unsupported_packaging_is_unresolvable() {
        let err = LauncherError::UnsupportedPackaging("ear".into());
        assert_eq!(err.cause(), FailureCause::Unresolvable);
    }
}
