use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the user asked for on top of the project's own metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LaunchOptions {
    /// Module references added to whatever analysis infers: `name`,
    /// `group:name` or `group:name:version`.
    pub modules: Vec<String>,
    /// Extra module directories, relative to the project base directory.
    pub module_paths: Vec<PathBuf>,
    pub jvm_args: Vec<String>,
    pub app_args: Vec<String>,
    /// System properties passed as `-Dkey=value`.
    pub properties: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
    pub main_class: Option<String>,
    pub debug_port: Option<u16>,
    pub stdout_file: Option<PathBuf>,
    pub stderr_file: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub use_executable_archive: bool,
    /// Block until the process exits instead of returning once it is ready.
    pub wait_for_exit: bool,
}
