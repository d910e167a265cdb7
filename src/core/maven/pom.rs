use std::collections::HashMap;

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::core::error::{LauncherError, LauncherResult};

/// Minimal POM model – only what the transitive walk needs.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PomDocument {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub parent: Option<PomParent>,
    #[serde(default)]
    pub properties: Option<HashMap<String, String>>,
    #[serde(default)]
    pub dependencies: Option<PomDependencies>,
    #[serde(default)]
    pub dependency_management: Option<PomDependencyManagement>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PomParent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct PomDependencies {
    #[serde(default, rename = "dependency")]
    pub items: Vec<PomDependency>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PomDependencyManagement {
    #[serde(default)]
    pub dependencies: Option<PomDependencies>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub optional: Option<bool>,
    #[serde(rename = "type", default)]
    pub dep_type: Option<String>,
    #[serde(default)]
    pub classifier: Option<String>,
}

impl PomDocument {
    pub fn parse(xml: &str) -> LauncherResult<Self> {
        from_str(xml).map_err(|e| LauncherError::PomParse(e.to_string()))
    }

    /// The project version, inherited from `<parent>` when not declared.
    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.version.as_str()))
    }

    /// Resolve a dependency version, falling back to `dependencyManagement`,
    /// and expand `${...}` references against `<properties>` and the project
    /// version. Unresolvable placeholders yield `None`.
    pub fn resolve_version(&self, dep: &PomDependency) -> Option<String> {
        let raw = dep.version.clone().or_else(|| {
            self.dependency_management
                .as_ref()
                .and_then(|dm| dm.dependencies.as_ref())
                .and_then(|deps| {
                    deps.items
                        .iter()
                        .find(|m| m.group_id == dep.group_id && m.artifact_id == dep.artifact_id)
                })
                .and_then(|managed| managed.version.clone())
        })?;

        let resolved = self.interpolate(&raw);
        if resolved.contains("${") {
            None
        } else {
            Some(resolved)
        }
    }

    fn interpolate(&self, raw: &str) -> String {
        let mut value = raw.to_string();
        if let Some(version) = self.effective_version() {
            value = value
                .replace("${project.version}", version)
                .replace("${pom.version}", version);
        }
        if let Some(props) = &self.properties {
            for (name, prop_value) in props {
                value = value.replace(&format!("${{{}}}", name), prop_value);
            }
        }
        value
    }

    /// Dependencies that end up on a runtime classpath: `compile` and
    /// `runtime` scope, never optional ones.
    pub fn runtime_dependencies(&self) -> Vec<PomDependency> {
        let deps = match &self.dependencies {
            Some(d) => &d.items,
            None => return vec![],
        };

        deps.iter()
            .filter(|d| {
                let scope = d.scope.as_deref().unwrap_or("compile");
                let optional = d.optional.unwrap_or(false);
                matches!(scope, "compile" | "runtime") && !optional
            })
            .cloned()
            .collect()
    }
}
