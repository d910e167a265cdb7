use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::catalog::CatalogSource;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MAVEN_CENTRAL;
use crate::core::supervisor::{ReadinessProbe, SupervisorOptions};

const APP_DIR_NAME: &str = "launchpad";
const SETTINGS_FILE: &str = "launcher_settings.json";

/// Line the runtime prints once the application is deployed and serving.
pub const DEFAULT_READY_MARKER: &str = "LPD-READY: application started";
/// Lines that mean startup failed even though the process may stay alive.
pub const DEFAULT_ERROR_MARKERS: &[&str] = &["LPD-FAILED:", "Exception in thread \"main\""];

/// Launcher-wide settings, persisted as JSON in the data directory.
/// Unknown or missing fields fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LauncherSettings {
    pub local_repository: PathBuf,
    pub repositories: Vec<String>,
    pub readiness_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub ready_marker: String,
    pub error_markers: Vec<String>,
    pub java_path: Option<PathBuf>,
    /// Replaces the builtin module catalog.
    pub catalog_path: Option<PathBuf>,
    pub download_concurrency: usize,
    pub verify_checksums: bool,
    /// Also resolve the runtime dependencies listed in each artifact's POM.
    pub transitive_resolution: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            local_repository: default_local_repository(),
            repositories: vec![MAVEN_CENTRAL.to_string()],
            readiness_timeout_secs: 120,
            grace_period_secs: 10,
            ready_marker: DEFAULT_READY_MARKER.to_string(),
            error_markers: DEFAULT_ERROR_MARKERS.iter().map(|m| m.to_string()).collect(),
            java_path: None,
            catalog_path: None,
            download_concurrency: 8,
            verify_checksums: true,
            transitive_resolution: true,
        }
    }
}

impl LauncherSettings {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn catalog_source(&self) -> CatalogSource {
        match &self.catalog_path {
            Some(path) => CatalogSource::File(path.clone()),
            None => CatalogSource::Builtin,
        }
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            readiness_timeout: self.readiness_timeout(),
            grace_period: self.grace_period(),
            probe: ReadinessProbe {
                ready_marker: self.ready_marker.clone(),
                error_markers: self.error_markers.clone(),
            },
        }
    }

    /// Repositories to search: the project's first, then the configured
    /// ones, without duplicates.
    pub fn repositories_for(&self, project_repositories: &[String]) -> Vec<String> {
        let mut repositories: Vec<String> = Vec::new();
        for repo in project_repositories.iter().chain(&self.repositories) {
            let normalized = repo.trim_end_matches('/').to_string();
            if !repositories.contains(&normalized) {
                repositories.push(normalized);
            }
        }
        repositories
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        std::fs::create_dir_all(data_dir).map_err(|source| LauncherError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }
}

/// Settings from `data_dir`, or defaults when the file is absent or broken.
pub fn load_settings(data_dir: &Path) -> LauncherSettings {
    let path = data_dir.join(SETTINGS_FILE);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return LauncherSettings::default();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Ignoring malformed settings {:?}: {}", path, e);
        LauncherSettings::default()
    })
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn default_local_repository() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".m2")
        .join("repository")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(dir.path());
        assert_eq!(settings, LauncherSettings::default());
        assert_eq!(settings.readiness_timeout(), Duration::from_secs(120));
        assert_eq!(settings.grace_period(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_keeps_defaults_for_absent_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"readinessTimeoutSecs": 30, "javaPath": "/opt/jdk/bin/java"}"#,
        )
        .unwrap();

        let settings = load_settings(dir.path());
        assert_eq!(settings.readiness_timeout_secs, 30);
        assert_eq!(settings.java_path, Some(PathBuf::from("/opt/jdk/bin/java")));
        assert_eq!(settings.grace_period_secs, 10);
        assert_eq!(settings.repositories, vec![MAVEN_CENTRAL.to_string()]);
        assert!(settings.transitive_resolution);
    }

    #[test]
    fn transitive_resolution_can_be_switched_off() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"transitiveResolution": false}"#,
        )
        .unwrap();
        assert!(!load_settings(dir.path()).transitive_resolution);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ nope").unwrap();
        assert_eq!(load_settings(dir.path()), LauncherSettings::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LauncherSettings {
            grace_period_secs: 3,
            catalog_path: Some(PathBuf::from("/etc/launchpad/modules.json")),
            ..LauncherSettings::default()
        };
        settings.save(dir.path()).unwrap();
        let loaded = load_settings(dir.path());
        assert_eq!(loaded, settings);
        assert_eq!(
            loaded.catalog_source(),
            CatalogSource::File(PathBuf::from("/etc/launchpad/modules.json"))
        );
    }

    #[test]
    fn project_repositories_come_first_without_duplicates() {
        let settings = LauncherSettings::default();
        let repos = settings.repositories_for(&[
            "https://repo.example.com/maven/".to_string(),
            format!("{MAVEN_CENTRAL}/"),
        ]);
        assert_eq!(
            repos,
            vec![
                "https://repo.example.com/maven".to_string(),
                MAVEN_CENTRAL.to_string()
            ]
        );
    }
}
