mod descriptor;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

pub use descriptor::{ModuleDescriptor, ModuleKey, TriggerSignatures};

/// Group assumed when a module is referenced by bare name.
pub const DEFAULT_MODULE_GROUP: &str = "dev.launchpad";

const BUILTIN_CATALOG: &str = include_str!("modules.json");

/// Where the catalog document comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CatalogSource {
    /// The catalog compiled into the binary.
    #[default]
    Builtin,
    File(PathBuf),
}

impl CatalogSource {
    fn read(&self) -> LauncherResult<String> {
        match self {
            CatalogSource::Builtin => Ok(BUILTIN_CATALOG.to_string()),
            CatalogSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                LauncherError::CatalogLoad(format!("cannot read {}: {}", path.display(), e))
            }),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    default_main_class: String,
    modules: Vec<ModuleDescriptor>,
}

/// The set of modules known to the orchestrator, keyed by `group:name`.
#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: BTreeMap<ModuleKey, ModuleDescriptor>,
    default_main_class: String,
}

static CATALOG: OnceLock<ModuleCatalog> = OnceLock::new();
static LOAD_LOCK: Mutex<()> = Mutex::new(());

impl ModuleCatalog {
    /// Process-wide catalog from the builtin document.
    pub fn load() -> LauncherResult<&'static ModuleCatalog> {
        Self::load_from(&CatalogSource::Builtin)
    }

    /// Process-wide catalog. The first successful call reads `source`; every
    /// later call returns that same instance and ignores its argument.
    /// Concurrent first callers block until the single load finishes.
    pub fn load_from(source: &CatalogSource) -> LauncherResult<&'static ModuleCatalog> {
        if let Some(catalog) = CATALOG.get() {
            return Ok(catalog);
        }

        let _guard = LOAD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(catalog) = CATALOG.get() {
            return Ok(catalog);
        }

        let catalog = Self::from_json(&source.read()?)?;
        info!("Loaded module catalog: {} modules", catalog.len());
        let _ = CATALOG.set(catalog);
        CATALOG
            .get()
            .ok_or_else(|| LauncherError::CatalogLoad("catalog was not stored".into()))
    }

    /// Parse and validate a catalog document without touching the global
    /// instance.
    pub fn from_json(raw: &str) -> LauncherResult<Self> {
        let document: CatalogDocument = serde_json::from_str(raw)
            .map_err(|e| LauncherError::CatalogLoad(format!("malformed catalog: {e}")))?;

        if document.default_main_class.trim().is_empty() {
            return Err(LauncherError::CatalogLoad(
                "defaultMainClass must not be empty".into(),
            ));
        }

        let mut modules = BTreeMap::new();
        for descriptor in document.modules {
            if descriptor.group_id.trim().is_empty()
                || descriptor.artifact_id.trim().is_empty()
                || descriptor.version.trim().is_empty()
            {
                return Err(LauncherError::CatalogLoad(format!(
                    "module '{}' is missing its coordinate",
                    descriptor.display_name
                )));
            }
            let key = descriptor.key();
            if modules.insert(key.clone(), descriptor).is_some() {
                return Err(LauncherError::CatalogLoad(format!(
                    "module {key} is declared twice"
                )));
            }
        }

        for descriptor in modules.values() {
            for dependency in &descriptor.dependencies {
                if !modules.contains_key(dependency) {
                    return Err(LauncherError::CatalogLoad(format!(
                        "module {} depends on unknown module {}",
                        descriptor.key(),
                        dependency
                    )));
                }
            }
        }

        Ok(Self {
            modules,
            default_main_class: document.default_main_class,
        })
    }

    pub fn lookup(&self, group: &str, name: &str) -> LauncherResult<&ModuleDescriptor> {
        self.get(&ModuleKey::new(group, name))
    }

    pub fn get(&self, key: &ModuleKey) -> LauncherResult<&ModuleDescriptor> {
        self.modules
            .get(key)
            .ok_or_else(|| LauncherError::ModuleNotFound {
                group: key.group.clone(),
                name: key.name.clone(),
            })
    }

    /// Every module, ordered by key.
    pub fn all(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn default_main_class(&self) -> &str {
        &self.default_main_class
    }

    /// Resolve a user-supplied module reference.
    ///
    /// Accepts `name`, `group:name` or `group:name:version`. A full
    /// coordinate the catalog does not know becomes an edge-less ad hoc
    /// module; a known one keeps its edges and takes the requested version.
    pub fn resolve_reference(&self, reference: &str) -> LauncherResult<ModuleDescriptor> {
        let parts: Vec<&str> = reference.trim().split(':').collect();
        match parts.as_slice() {
            [name] => self.lookup(DEFAULT_MODULE_GROUP, name).cloned(),
            [group, name] => self.lookup(group, name).cloned(),
            [group, name, version] => {
                let artifact = MavenArtifact::parse(reference.trim())?;
                match self.lookup(group, name) {
                    Ok(known) => Ok(known.with_version(version)),
                    Err(_) => {
                        debug!("Module {} is not in the catalog, using it as given", artifact);
                        Ok(ModuleDescriptor::ad_hoc(&artifact))
                    }
                }
            }
            _ => Err(LauncherError::InvalidMavenCoordinate(reference.to_string())),
        }
    }
}
