pub mod config;
pub mod options;
pub mod packaging;

pub use config::{
    build, LaunchConfiguration, APP_NAME_PROPERTY, APP_PATH_PROPERTY, MODULE_PATH_PROPERTY,
    REPOSITORIES_PROPERTY,
};
pub use options::LaunchOptions;
pub use packaging::{ApplicationArtifact, PackagingKind, EXECUTABLE_ARCHIVE_SUFFIX};
