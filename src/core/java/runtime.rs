use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::error::{LauncherError, LauncherResult};

/// A Java runtime found on this machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
    pub vendor: String,
}

/// Pick the Java binary to launch with: an explicitly configured path,
/// then `JAVA_HOME`, then the first `java` on `PATH`.
pub fn resolve_java_binary(explicit: Option<&Path>) -> LauncherResult<PathBuf> {
    resolve_java_binary_from(
        explicit,
        std::env::var_os("JAVA_HOME").map(PathBuf::from),
        std::env::var_os("PATH"),
    )
}

#[instrument(skip(path_var))]
fn resolve_java_binary_from(
    explicit: Option<&Path>,
    java_home: Option<PathBuf>,
    path_var: Option<OsString>,
) -> LauncherResult<PathBuf> {
    if let Some(configured) = explicit {
        if configured.is_file() {
            return Ok(configured.to_path_buf());
        }
        if configured.is_dir() {
            if let Some(found) = locate_java_binary(configured) {
                return Ok(found);
            }
        }
        return Err(LauncherError::Spawn {
            program: configured.to_path_buf(),
            reason: "configured Java runtime does not exist".into(),
        });
    }

    if let Some(home) = java_home {
        if let Some(found) = locate_java_binary(&home) {
            debug!("Using Java from JAVA_HOME: {:?}", found);
            return Ok(found);
        }
        debug!("JAVA_HOME {:?} has no Java binary, searching PATH", home);
    }

    if let Some(found) = path_var.as_deref().and_then(find_on_path) {
        debug!("Using Java from PATH: {:?}", found);
        return Ok(found);
    }

    Err(LauncherError::Spawn {
        program: PathBuf::from(java_exe()),
        reason: "no Java runtime found; set JAVA_HOME or javaPath in the settings".into(),
    })
}

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// `bin/java` under a runtime root, including the macOS bundle layout.
fn locate_java_binary(runtime_root: &Path) -> Option<PathBuf> {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.is_file() {
        return Some(primary);
    }

    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    mac_layout.is_file().then_some(mac_layout)
}

fn find_on_path(path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(java_exe()))
        .find(|candidate| candidate.is_file())
}

/// Run `java -version` and parse what it reports.
#[instrument]
pub fn probe_java(path: &Path) -> Option<JavaInstallation> {
    let output = Command::new(path).arg("-version").output().ok()?;
    let version_output = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );

    let version = parse_version_string(&version_output)?;
    let installation = JavaInstallation {
        path: std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
        major: parse_major_version(&version),
        vendor: parse_vendor(&version_output),
        version,
    };
    info!(
        "Java {} ({}) at {:?}",
        installation.version, installation.vendor, installation.path
    );
    Some(installation)
}

fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find('"')?;
        let end = line[start + 1..].find('"')?;
        Some(line[start + 1..start + 1 + end].to_string())
    })
}

/// `1.8.0_392` is Java 8, `17.0.9` is Java 17.
fn parse_major_version(version: &str) -> u32 {
    let first_part = version.split('.').next().unwrap_or("0");
    let major: u32 = first_part.parse().unwrap_or(0);

    if major == 1 {
        version
            .split('.')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(major)
    } else {
        major
    }
}

fn parse_vendor(output: &str) -> String {
    for line in output.lines() {
        if line.contains("Temurin") {
            return "Temurin".to_string();
        }
        if line.contains("OpenJDK") {
            return "OpenJDK".to_string();
        }
        if line.contains("Java(TM)") {
            return "Oracle".to_string();
        }
    }
    "unknown".to_string()
}
