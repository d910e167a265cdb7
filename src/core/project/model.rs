use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

/// Coordinate of the artifact that carries its own runtime wiring. When a
/// project declares it, module inference is skipped entirely.
pub const BOOTSTRAP_GROUP_ID: &str = "dev.launchpad";
pub const BOOTSTRAP_ARTIFACT_ID: &str = "bootstrap";

/// Maven dependency scope.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

impl DependencyScope {
    /// Provided and test dependencies never reach the launched classpath.
    pub fn ships_at_runtime(self) -> bool {
        !matches!(self, DependencyScope::Provided | DependencyScope::Test)
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyScope::Compile => write!(f, "compile"),
            DependencyScope::Runtime => write!(f, "runtime"),
            DependencyScope::Provided => write!(f, "provided"),
            DependencyScope::Test => write!(f, "test"),
            DependencyScope::System => write!(f, "system"),
        }
    }
}

/// A dependency the build already declared, with the file the build
/// resolved it to when known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredDependency {
    #[serde(rename = "coordinate")]
    pub artifact: MavenArtifact,
    #[serde(default)]
    pub scope: DependencyScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl DeclaredDependency {
    pub fn new(artifact: MavenArtifact, scope: DependencyScope) -> Self {
        Self {
            artifact,
            scope,
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Build metadata of the project being launched, as exported by the build
/// tool into `launchpad-project.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub final_name: String,
    #[serde(default = "default_packaging")]
    pub packaging: String,
    #[serde(default = "default_base_directory")]
    pub base_directory: PathBuf,
    #[serde(default = "default_build_directory")]
    pub build_directory: PathBuf,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<DeclaredDependency>,
    /// Remote repositories the build resolved against, searched before the
    /// ones configured in the launcher settings.
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            final_name: String::new(),
            packaging: default_packaging(),
            base_directory: default_base_directory(),
            build_directory: default_build_directory(),
            output_directory: default_output_directory(),
            dependencies: Vec::new(),
            repositories: Vec::new(),
        }
    }
}

fn default_packaging() -> String {
    "jar".to_string()
}

fn default_base_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_directory() -> PathBuf {
    PathBuf::from("target")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("target").join("classes")
}

impl ProjectMetadata {
    /// Read a project file. Relative directories are anchored at the file's
    /// parent directory so the launcher can be run from anywhere.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut project: ProjectMetadata = serde_json::from_str(&raw)?;

        let anchor = path.parent().unwrap_or_else(|| Path::new("."));
        project.base_directory = anchor.join(&project.base_directory);
        project.build_directory = project.base_directory.join(&project.build_directory);
        project.output_directory = project.base_directory.join(&project.output_directory);
        for dependency in &mut project.dependencies {
            if let Some(file) = dependency.file.take() {
                dependency.file = Some(project.base_directory.join(file));
            }
        }

        debug!(
            "Loaded project {} ({}, {} dependencies)",
            project.final_name,
            project.packaging,
            project.dependencies.len()
        );
        Ok(project)
    }

    /// Whether the build already brings the bootstrap artifact.
    pub fn declares_bootstrap(&self) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.artifact.matches(BOOTSTRAP_GROUP_ID, BOOTSTRAP_ARTIFACT_ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_anchors_relative_paths_at_the_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("launchpad-project.json");
        std::fs::write(
            &file,
            r#"{
                "finalName": "shop",
                "packaging": "war",
                "dependencies": [
                    {"coordinate": "com.example:lib:1.0", "file": "libs/lib-1.0.jar"},
                    {"coordinate": "javax:javaee-api:7.0", "scope": "provided"}
                ]
            }"#,
        )
        .unwrap();

        let project = ProjectMetadata::load(&file).unwrap();
        assert_eq!(project.final_name, "shop");
        assert_eq!(project.packaging, "war");
        assert_eq!(
            project.output_directory,
            dir.path().join(".").join("target").join("classes")
        );
        assert_eq!(
            project.dependencies[0].file.as_deref(),
            Some(dir.path().join(".").join("libs/lib-1.0.jar").as_path())
        );
        assert_eq!(project.dependencies[0].scope, DependencyScope::Compile);
        assert!(!project.dependencies[1].scope.ships_at_runtime());
        assert!(!project.declares_bootstrap());
    }

    #[test]
    fn bootstrap_declaration_is_detected_by_group_and_artifact() {
        let project: ProjectMetadata = serde_json::from_str(
            r#"{"finalName":"app","dependencies":[{"coordinate":"dev.launchpad:bootstrap:1.4.0"}]}"#,
        )
        .unwrap();
        assert!(project.declares_bootstrap());
        assert_eq!(project.packaging, "jar");
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        let result: Result<ProjectMetadata, _> = serde_json::from_str(
            r#"{"finalName":"app","dependencies":[{"coordinate":"not-a-coordinate"}]}"#,
        );
        assert!(result.is_err());
    }
}
