mod contents;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::core::catalog::{ModuleCatalog, ModuleDescriptor, ModuleKey, TriggerSignatures};
use crate::core::error::LauncherResult;

pub use contents::{
    open_contents, ArchiveContents, ArtifactContents, ContentEntry, DirectoryContents,
    InMemoryContents,
};

/// Modules whose trigger signatures were found in an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleUsageSet {
    modules: BTreeMap<ModuleKey, ModuleDescriptor>,
}

impl ModuleUsageSet {
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.modules.contains_key(key)
    }

    /// Detected modules in key order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn insert(&mut self, descriptor: ModuleDescriptor) {
        self.modules.insert(descriptor.key(), descriptor);
    }
}

impl FromIterator<ModuleDescriptor> for ModuleUsageSet {
    fn from_iter<I: IntoIterator<Item = ModuleDescriptor>>(iter: I) -> Self {
        let mut set = Self::default();
        for descriptor in iter {
            set.insert(descriptor);
        }
        set
    }
}

/// Scan `contents` and report every catalog module with at least one
/// matching trigger. Modules without triggers are never inferred; they only
/// enter a launch as dependencies or explicit requests.
pub fn detect_used_modules(
    catalog: &ModuleCatalog,
    contents: &dyn ArtifactContents,
) -> LauncherResult<ModuleUsageSet> {
    let entries = contents.entries()?;

    let detected = catalog
        .all()
        .filter(|module| !module.triggers.is_empty())
        .filter(|module| {
            let hit = triggered_by(&module.triggers, &entries);
            if let Some(entry) = hit {
                debug!("Module {} triggered by {}", module.key(), entry);
            }
            hit.is_some()
        })
        .cloned()
        .collect();

    Ok(detected)
}

/// Convenience for on-disk artifacts: archives or exploded directories.
pub fn analyze_path(catalog: &ModuleCatalog, path: &Path) -> LauncherResult<ModuleUsageSet> {
    let contents = open_contents(path)?;
    detect_used_modules(catalog, contents.as_ref())
}

fn triggered_by<'a>(triggers: &TriggerSignatures, entries: &'a [ContentEntry]) -> Option<&'a str> {
    entries
        .iter()
        .find(|entry| {
            triggers
                .resources
                .iter()
                .any(|marker| resource_matches(&entry.name, marker))
                || entry.bytes.as_deref().is_some_and(|bytes| {
                    triggers
                        .classes
                        .iter()
                        .any(|signature| contains_bytes(bytes, signature.as_bytes()))
                })
        })
        .map(|entry| entry.name.as_str())
}

fn resource_matches(name: &str, marker: &str) -> bool {
    if marker.ends_with('/') {
        name.starts_with(marker)
    } else {
        name == marker
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
