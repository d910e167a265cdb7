pub mod model;

pub use model::{
    DeclaredDependency, DependencyScope, ProjectMetadata, BOOTSTRAP_ARTIFACT_ID,
    BOOTSTRAP_GROUP_ID,
};
