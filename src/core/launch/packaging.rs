use std::fmt;
use std::path::PathBuf;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::project::ProjectMetadata;

/// Suffix of the self-contained archive the build produces next to the
/// regular artifact.
pub const EXECUTABLE_ARCHIVE_SUFFIX: &str = "-launchpad.jar";

/// How the application is handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingKind {
    /// A single self-contained jar run with `-jar`.
    ExecutableArchive,
    /// A `.war` next to the build output, launched on a resolved classpath.
    WebArchive,
    /// The compiled class directory, launched on a resolved classpath.
    PlainClasses,
}

impl PackagingKind {
    /// Pick the launch strategy. The executable archive wins whenever it is
    /// requested; otherwise the project packaging decides.
    pub fn select(packaging: &str, use_executable_archive: bool) -> LauncherResult<Self> {
        if use_executable_archive {
            return Ok(PackagingKind::ExecutableArchive);
        }
        match packaging {
            "war" => Ok(PackagingKind::WebArchive),
            "jar" => Ok(PackagingKind::PlainClasses),
            other => Err(LauncherError::UnsupportedPackaging(other.to_string())),
        }
    }

    /// Whether this kind launches on a classpath the orchestrator assembles.
    pub fn needs_classpath(self) -> bool {
        !matches!(self, PackagingKind::ExecutableArchive)
    }

    /// Name and location of the artifact the runtime is pointed at.
    pub fn application(self, project: &ProjectMetadata) -> ApplicationArtifact {
        let final_name = project.final_name.as_str();
        match self {
            PackagingKind::WebArchive => {
                let name = with_extension(final_name, ".war");
                ApplicationArtifact {
                    path: project.build_directory.join(&name),
                    name,
                }
            }
            PackagingKind::PlainClasses => ApplicationArtifact {
                name: with_extension(final_name, ".jar"),
                path: project.output_directory.clone(),
            },
            PackagingKind::ExecutableArchive => {
                let base = final_name
                    .strip_suffix(".war")
                    .or_else(|| final_name.strip_suffix(".jar"))
                    .unwrap_or(final_name);
                let name = format!("{base}{EXECUTABLE_ARCHIVE_SUFFIX}");
                ApplicationArtifact {
                    path: project.build_directory.join(&name),
                    name,
                }
            }
        }
    }
}

impl fmt::Display for PackagingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackagingKind::ExecutableArchive => write!(f, "executable archive"),
            PackagingKind::WebArchive => write!(f, "war"),
            PackagingKind::PlainClasses => write!(f, "jar"),
        }
    }
}

/// The application as seen by the runtime: a file name and where its
/// contents live (an archive or a class directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationArtifact {
    pub name: String,
    pub path: PathBuf,
}

fn with_extension(name: &str, extension: &str) -> String {
    if name.ends_with(extension) {
        name.to_string()
    } else {
        format!("{name}{extension}")
    }
}
