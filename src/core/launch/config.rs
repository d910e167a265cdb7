// ─── Launch Configuration ───
// Turns a resolved closure plus user options into the exact command the
// supervisor spawns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::LauncherResult;
use crate::core::maven::ResolvedArtifact;
use crate::core::project::ProjectMetadata;

use super::options::LaunchOptions;
use super::packaging::{ApplicationArtifact, PackagingKind};

/// File name of the application as the runtime should report it.
pub const APP_NAME_PROPERTY: &str = "launchpad.app.name";
/// Archive or class directory holding the application.
pub const APP_PATH_PROPERTY: &str = "launchpad.app.path";
/// Extra module directories, joined with the platform path separator.
pub const MODULE_PATH_PROPERTY: &str = "launchpad.modules.path";
/// Remote repositories the runtime may fetch modules from, comma-joined.
pub const REPOSITORIES_PROPERTY: &str = "launchpad.repositories";

/// Everything needed to spawn the application process. Immutable once
/// built; the supervisor only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchConfiguration {
    pub java: PathBuf,
    /// Set for executable archives, which run with `-jar` and no classpath.
    pub executable_archive: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub module_paths: Vec<PathBuf>,
    pub main_class: Option<String>,
    pub jvm_args: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub app_args: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    pub debug_port: Option<u16>,
    pub stdout_file: Option<PathBuf>,
    pub stderr_file: Option<PathBuf>,
}

impl LaunchConfiguration {
    /// Arguments after the program: JVM flags, debug agent, system
    /// properties, then `-jar <archive>` or `-cp <classpath> <main>`, then
    /// application arguments.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.jvm_args.clone();

        if let Some(port) = self.debug_port {
            args.push(format!(
                "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address={port}"
            ));
        }

        for (key, value) in &self.properties {
            args.push(format!("-D{key}={value}"));
        }

        match &self.executable_archive {
            Some(archive) => {
                args.push("-jar".into());
                args.push(safe_path_str(archive));
            }
            None => {
                if !self.classpath.is_empty() {
                    args.push("-cp".into());
                    args.push(self.classpath_string());
                }
                if let Some(main_class) = &self.main_class {
                    args.push(main_class.clone());
                }
            }
        }

        args.extend(self.app_args.iter().cloned());
        args
    }

    pub fn classpath_string(&self) -> String {
        self.classpath
            .iter()
            .map(|p| safe_path_str(p))
            .collect::<Vec<_>>()
            .join(get_classpath_separator())
    }

    /// Copy/paste friendly rendering for logs.
    pub fn format_command(&self) -> String {
        std::iter::once(self.java.to_string_lossy().to_string())
            .chain(self.command_args())
            .map(|arg| shell_escape(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Assemble the launch configuration for one packaging branch.
///
/// `resolved` is ignored for executable archives, which carry their own
/// dependencies. For the classpath branches the project output directory
/// comes first, followed by the resolved artifacts in order.
#[allow(clippy::too_many_arguments)]
pub fn build(
    kind: PackagingKind,
    app: &ApplicationArtifact,
    resolved: &[ResolvedArtifact],
    project: &ProjectMetadata,
    options: &LaunchOptions,
    repositories: &[String],
    default_main_class: &str,
    java: PathBuf,
) -> LauncherResult<LaunchConfiguration> {
    let module_paths = existing_module_paths(project, options);

    let mut jvm_args = sanitize_jvm_args(&options.jvm_args);
    let mut properties = options.properties.clone();
    properties.insert(APP_NAME_PROPERTY.into(), app.name.clone());
    properties.insert(REPOSITORIES_PROPERTY.into(), repositories.join(","));
    if kind.needs_classpath() {
        properties.insert(APP_PATH_PROPERTY.into(), safe_path_str(&app.path));
    }
    if !module_paths.is_empty() {
        let joined = module_paths
            .iter()
            .map(|p| safe_path_str(p))
            .collect::<Vec<_>>()
            .join(get_classpath_separator());
        properties.insert(MODULE_PATH_PROPERTY.into(), joined);
    }
    for key in properties.keys() {
        drop_jvm_system_property(&mut jvm_args, key);
    }

    let (executable_archive, classpath, main_class) = match kind {
        PackagingKind::ExecutableArchive => (Some(app.path.clone()), Vec::new(), None),
        PackagingKind::WebArchive | PackagingKind::PlainClasses => {
            let mut classpath = vec![project.output_directory.clone()];
            classpath.extend(resolved.iter().map(|r| r.file.clone()));
            dedup_preserving_order(&mut classpath);
            let main_class = options
                .main_class
                .clone()
                .unwrap_or_else(|| default_main_class.to_string());
            (None, classpath, Some(main_class))
        }
    };

    let config = LaunchConfiguration {
        java,
        executable_archive,
        classpath,
        module_paths,
        main_class,
        jvm_args,
        properties,
        app_args: options.app_args.clone(),
        environment: options.environment.clone(),
        working_directory: Some(
            options
                .working_directory
                .clone()
                .unwrap_or_else(|| project.base_directory.clone()),
        ),
        debug_port: options.debug_port,
        stdout_file: options.stdout_file.clone(),
        stderr_file: options.stderr_file.clone(),
    };

    debug!(
        "Launch configuration for {} ({}): {} classpath entries",
        app.name,
        kind,
        config.classpath.len()
    );
    Ok(config)
}

fn existing_module_paths(project: &ProjectMetadata, options: &LaunchOptions) -> Vec<PathBuf> {
    options
        .module_paths
        .iter()
        .map(|p| project.output_directory.join(p))
        .filter(|p| {
            let exists = p.is_dir();
            if !exists {
                warn!("Ignoring missing module path {:?}", p);
            }
            exists
        })
        .collect()
}

/// The classpath and entry point are always injected by the orchestrator,
/// so user-supplied switches for them are dropped together with their value.
fn sanitize_jvm_args(raw_args: &[String]) -> Vec<String> {
    let mut sanitized = Vec::with_capacity(raw_args.len());
    let mut i = 0;
    while i < raw_args.len() {
        let arg = &raw_args[i];
        if matches!(arg.as_str(), "-cp" | "-classpath" | "--class-path" | "-jar") {
            i += 2;
            continue;
        }
        sanitized.push(arg.clone());
        i += 1;
    }
    sanitized
}

fn drop_jvm_system_property(args: &mut Vec<String>, property: &str) {
    let prefix = format!("-D{}=", property);
    args.retain(|arg| !arg.starts_with(&prefix));
}

fn dedup_preserving_order(entries: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|entry| seen.insert(entry.clone()));
}

pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Canonical form of a path when it exists, the path as given otherwise.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        // The JVM rejects extended-length paths on the classpath.
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
