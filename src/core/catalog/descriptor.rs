use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

/// Identity of a module inside the catalog: `group:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleKey {
    pub group: String,
    pub name: String,
}

impl ModuleKey {
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(raw: &str) -> LauncherResult<Self> {
        match raw.split_once(':') {
            Some((group, name))
                if !group.trim().is_empty() && !name.trim().is_empty() && !name.contains(':') =>
            {
                Ok(Self::new(group.trim(), name.trim()))
            }
            _ => Err(LauncherError::CatalogLoad(format!(
                "invalid module reference '{raw}', expected group:name"
            ))),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl TryFrom<String> for ModuleKey {
    type Error = LauncherError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ModuleKey> for String {
    fn from(key: ModuleKey) -> Self {
        key.to_string()
    }
}

/// What to look for in the application to infer that a module is used.
///
/// `classes` entries are internal binary names or package prefixes
/// (`javax/ws/rs/`) matched against class file bytes. `resources` entries are
/// archive entry names, matched exactly or as a directory prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSignatures {
    pub classes: Vec<String>,
    pub resources: Vec<String>,
}

impl TriggerSignatures {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.resources.is_empty()
    }
}

/// One installable runtime module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<ModuleKey>,
    #[serde(default)]
    pub triggers: TriggerSignatures,
}

impl ModuleDescriptor {
    /// Descriptor for a module the catalog does not know. It carries no
    /// dependency edges and can never be inferred.
    pub fn ad_hoc(artifact: &MavenArtifact) -> Self {
        Self {
            group_id: artifact.group_id.clone(),
            artifact_id: artifact.artifact_id.clone(),
            version: artifact.version.clone(),
            display_name: artifact.artifact_id.clone(),
            description: String::new(),
            dependencies: Vec::new(),
            triggers: TriggerSignatures::default(),
        }
    }

    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(&self.group_id, &self.artifact_id)
    }

    /// `artifactId:version`, the form used in progress reporting.
    pub fn av(&self) -> String {
        format!("{}:{}", self.artifact_id, self.version)
    }

    pub fn gav(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }

    pub fn artifact(&self) -> MavenArtifact {
        MavenArtifact::new(&self.group_id, &self.artifact_id, &self.version)
    }

    pub fn with_version(&self, version: &str) -> Self {
        let mut clone = self.clone();
        clone.version = version.to_string();
        clone
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.av())
    }
}
