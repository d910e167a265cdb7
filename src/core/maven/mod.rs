mod artifact;
mod pom;
mod resolver;

pub use artifact::{ArtifactKey, MavenArtifact, ResolvedArtifact};
pub use pom::{PomDependency, PomDocument};
pub use resolver::{CoordinateResolver, MavenResolver};

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
