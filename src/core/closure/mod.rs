use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{debug, info};

use crate::core::analyzer::ModuleUsageSet;
use crate::core::catalog::{ModuleCatalog, ModuleDescriptor, ModuleKey};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{ArtifactKey, CoordinateResolver, MavenArtifact, ResolvedArtifact};
use crate::core::project::{DeclaredDependency, BOOTSTRAP_ARTIFACT_ID, BOOTSTRAP_GROUP_ID};

/// Logging bridge the runtime provides itself; a copy from the project
/// would shadow it.
pub const LOGGING_BRIDGE_GROUP_ID: &str = "org.jboss.logmanager";
pub const LOGGING_BRIDGE_ARTIFACT_ID: &str = "jboss-logmanager";

fn ships_with_project(dependency: &DeclaredDependency) -> bool {
    dependency.scope.ships_at_runtime()
        && !dependency
            .artifact
            .matches(LOGGING_BRIDGE_GROUP_ID, LOGGING_BRIDGE_ARTIFACT_ID)
}

/// Where an entry of the closure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    Declared,
    Module,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureEntry {
    pub artifact: MavenArtifact,
    /// Already-resolved file, known for declared dependencies only.
    pub file: Option<PathBuf>,
    pub origin: EntryOrigin,
}

/// The final coordinate set to run with, one entry per `(group, artifact)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyClosure {
    entries: BTreeMap<ArtifactKey, ClosureEntry>,
    modules: Vec<ModuleKey>,
}

impl DependencyClosure {
    /// The declared dependencies that ship at runtime, without any module
    /// expansion. The bootstrap artifact stays: it is what runs the project.
    pub fn declared_only(existing: &[DeclaredDependency]) -> Self {
        let mut closure = Self::default();
        closure.insert_declared(existing.iter().filter(|d| ships_with_project(d)));
        closure
    }

    pub fn entries(&self) -> impl Iterator<Item = &ClosureEntry> {
        self.entries.values()
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&ClosureEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `group:artifact:version` of every entry, sorted.
    pub fn to_coordinates(&self) -> Vec<String> {
        let mut coordinates: Vec<String> = self
            .entries
            .values()
            .map(|e| {
                format!(
                    "{}:{}:{}",
                    e.artifact.group_id, e.artifact.artifact_id, e.artifact.version
                )
            })
            .collect();
        coordinates.sort();
        coordinates
    }

    /// Every module pulled in, seeds and dependencies alike, in key order.
    pub fn modules(&self) -> &[ModuleKey] {
        &self.modules
    }

    /// Declared dependencies ahead of module expansion. The bootstrap
    /// artifact is left out here; the modules replace it.
    fn merge_declared(&mut self, existing: &[DeclaredDependency]) {
        self.insert_declared(existing.iter().filter(|d| {
            ships_with_project(d) && !d.artifact.matches(BOOTSTRAP_GROUP_ID, BOOTSTRAP_ARTIFACT_ID)
        }));
    }

    fn insert_declared<'a>(&mut self, declared: impl Iterator<Item = &'a DeclaredDependency>) {
        let mut declared: Vec<&DeclaredDependency> = declared.collect();
        declared.sort_by(|a, b| a.artifact.cmp(&b.artifact));

        for dependency in declared {
            self.entries.insert(
                dependency.artifact.key(),
                ClosureEntry {
                    artifact: dependency.artifact.clone(),
                    file: dependency.file.clone(),
                    origin: EntryOrigin::Declared,
                },
            );
        }
    }

    /// Turn the closure into files. Entries with a file on disk are used as
    /// is; the rest go through `resolver` in one batch. Coordinates the
    /// resolver adds transitively never displace an entry of the closure.
    pub async fn resolve(
        &self,
        resolver: &dyn CoordinateResolver,
    ) -> LauncherResult<Vec<ResolvedArtifact>> {
        let mut out: BTreeMap<ArtifactKey, ResolvedArtifact> = BTreeMap::new();
        let mut pending = Vec::new();

        for (key, entry) in &self.entries {
            match &entry.file {
                Some(file) if file.is_file() => {
                    out.insert(
                        key.clone(),
                        ResolvedArtifact {
                            artifact: entry.artifact.clone(),
                            file: file.clone(),
                        },
                    );
                }
                _ => pending.push(entry.artifact.clone()),
            }
        }

        if !pending.is_empty() {
            debug!("Resolving {} coordinates", pending.len());
            for resolved in resolver.resolve_all(&pending).await? {
                let key = resolved.artifact.key();
                let requested = self
                    .entries
                    .get(&key)
                    .is_some_and(|e| e.artifact == resolved.artifact);
                if requested || (!out.contains_key(&key) && !self.entries.contains_key(&key)) {
                    out.insert(key, resolved);
                }
            }
        }

        Ok(out.into_values().collect())
    }
}

/// Expand the inferred and explicit modules along their dependency edges
/// and merge them with the project's declared dependencies.
///
/// Declared dependencies go in first, then module artifacts; on a
/// `(group, artifact)` collision the later entry wins, so module versions
/// override declared ones. Inputs are sorted before merging, which makes the
/// result independent of input order.
pub fn compute_closure(
    catalog: &ModuleCatalog,
    existing: &[DeclaredDependency],
    inferred: &ModuleUsageSet,
    explicit: &[ModuleDescriptor],
) -> LauncherResult<DependencyClosure> {
    let mut seeds: BTreeMap<ModuleKey, ModuleDescriptor> = BTreeMap::new();
    for descriptor in inferred.iter() {
        seeds.insert(descriptor.key(), descriptor.clone());
    }
    for descriptor in explicit {
        seeds.insert(descriptor.key(), descriptor.clone());
    }

    let mut expanded: BTreeMap<ModuleKey, ModuleDescriptor> = BTreeMap::new();
    let mut marks: HashMap<ModuleKey, Mark> = HashMap::new();
    let mut path: Vec<ModuleKey> = Vec::new();
    for descriptor in seeds.values() {
        visit(catalog, &seeds, descriptor, &mut marks, &mut path, &mut expanded)?;
    }

    let mut closure = DependencyClosure::default();
    closure.merge_declared(existing);
    for descriptor in expanded.values() {
        let artifact = descriptor.artifact();
        closure.entries.insert(
            artifact.key(),
            ClosureEntry {
                artifact,
                file: None,
                origin: EntryOrigin::Module,
            },
        );
    }
    closure.modules = expanded.into_keys().collect();

    info!(
        "Dependency closure: {} modules, {} artifacts",
        closure.modules.len(),
        closure.entries.len()
    );
    Ok(closure)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

fn visit(
    catalog: &ModuleCatalog,
    seeds: &BTreeMap<ModuleKey, ModuleDescriptor>,
    descriptor: &ModuleDescriptor,
    marks: &mut HashMap<ModuleKey, Mark>,
    path: &mut Vec<ModuleKey>,
    out: &mut BTreeMap<ModuleKey, ModuleDescriptor>,
) -> LauncherResult<()> {
    let key = descriptor.key();
    match marks.get(&key) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            let start = path.iter().position(|k| *k == key).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
            cycle.push(key.to_string());
            return Err(LauncherError::CatalogIntegrity { cycle });
        }
        None => {}
    }

    marks.insert(key.clone(), Mark::InProgress);
    path.push(key.clone());

    for dependency in &descriptor.dependencies {
        // A seed for the same key carries the requested version.
        let next = match seeds.get(dependency) {
            Some(seed) => seed,
            None => catalog.get(dependency)?,
        };
        visit(catalog, seeds, next, marks, path, out)?;
    }

    path.pop();
    marks.insert(key.clone(), Mark::Done);
    out.insert(key, descriptor.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::project::DependencyScope;

    fn catalog() -> ModuleCatalog {
        ModuleCatalog::from_json(
            r#"{
                "defaultMainClass": "M",
                "modules": [
                    {"groupId":"g","artifactId":"container","version":"1.0","name":"Container"},
                    {"groupId":"g","artifactId":"logging","version":"1.0","name":"Logging",
                     "dependencies":["g:container"]},
                    {"groupId":"g","artifactId":"web","version":"1.0","name":"Web",
                     "dependencies":["g:container"]},
                    {"groupId":"g","artifactId":"rest","version":"1.0","name":"REST",
                     "dependencies":["g:web","g:logging"]}
                ]
            }"#,
        )
        .unwrap()
    }

    fn declared(coord: &str, scope: DependencyScope) -> DeclaredDependency {
        DeclaredDependency::new(MavenArtifact::parse(coord).unwrap(), scope)
    }

    fn ids(closure: &DependencyClosure) -> Vec<String> {
        closure
            .entries()
            .map(|e| format!("{}:{}", e.artifact.artifact_id, e.artifact.version))
            .collect()
    }

    #[test]
    fn expands_module_dependencies_transitively() {
        let catalog = catalog();
        let inferred: ModuleUsageSet = [catalog.lookup("g", "rest").unwrap().clone()]
            .into_iter()
            .collect();

        let closure = compute_closure(&catalog, &[], &inferred, &[]).unwrap();
        assert_eq!(
            ids(&closure),
            vec!["container:1.0", "logging:1.0", "rest:1.0", "web:1.0"]
        );
        assert_eq!(closure.modules().len(), 4);
    }

    #[test]
    fn excludes_bootstrap_logging_bridge_and_non_runtime_scopes() {
        let existing = vec![
            declared("com.example:lib:1.0", DependencyScope::Compile),
            declared("dev.launchpad:bootstrap:1.4.0", DependencyScope::Compile),
            declared("org.jboss.logmanager:jboss-logmanager:2.0", DependencyScope::Compile),
            declared("javax:javaee-api:7.0", DependencyScope::Provided),
            declared("junit:junit:4.12", DependencyScope::Test),
            declared("com.example:driver:3.0", DependencyScope::Runtime),
        ];

        let closure =
            compute_closure(&catalog(), &existing, &ModuleUsageSet::default(), &[]).unwrap();
        assert_eq!(ids(&closure), vec!["driver:3.0", "lib:1.0"]);
    }

    #[test]
    fn coordinates_are_listed_sorted() {
        let catalog = catalog();
        let existing = vec![declared("org.acme:zeta:2.0", DependencyScope::Compile)];
        let inferred: ModuleUsageSet = [catalog.lookup("g", "web").unwrap().clone()]
            .into_iter()
            .collect();

        let closure = compute_closure(&catalog, &existing, &inferred, &[]).unwrap();
        assert_eq!(
            closure.to_coordinates(),
            vec!["g:container:1.0", "g:web:1.0", "org.acme:zeta:2.0"]
        );
    }

    #[test]
    fn module_version_overrides_declared_version() {
        let catalog = catalog();
        let existing = vec![declared("g:web:0.9", DependencyScope::Compile)];
        let inferred: ModuleUsageSet = [catalog.lookup("g", "web").unwrap().clone()]
            .into_iter()
            .collect();

        let closure = compute_closure(&catalog, &existing, &inferred, &[]).unwrap();
        let web = closure
            .get(&ArtifactKey {
                group_id: "g".into(),
                artifact_id: "web".into(),
            })
            .unwrap();
        assert_eq!(web.artifact.version, "1.0");
        assert_eq!(web.origin, EntryOrigin::Module);
    }

    #[test]
    fn explicit_modules_join_inferred_ones_and_keep_their_version() {
        let catalog = catalog();
        let explicit = vec![
            catalog.resolve_reference("g:logging:2.0").unwrap(),
            catalog.resolve_reference("org.other:addon:0.1").unwrap(),
        ];
        let inferred: ModuleUsageSet = [catalog.lookup("g", "rest").unwrap().clone()]
            .into_iter()
            .collect();

        let closure = compute_closure(&catalog, &[], &inferred, &explicit).unwrap();
        assert_eq!(
            ids(&closure),
            vec![
                "container:1.0",
                "logging:2.0",
                "rest:1.0",
                "web:1.0",
                "addon:0.1"
            ]
        );
    }

    #[test]
    fn result_is_independent_of_input_order() {
        let catalog = catalog();
        let a = declared("com.example:a:1.0", DependencyScope::Compile);
        let b = declared("com.example:b:1.0", DependencyScope::Compile);
        let explicit_one = vec![
            catalog.lookup("g", "web").unwrap().clone(),
            catalog.lookup("g", "logging").unwrap().clone(),
        ];
        let explicit_two: Vec<_> = explicit_one.iter().rev().cloned().collect();

        let first = compute_closure(
            &catalog,
            &[a.clone(), b.clone()],
            &ModuleUsageSet::default(),
            &explicit_one,
        )
        .unwrap();
        let second =
            compute_closure(&catalog, &[b, a], &ModuleUsageSet::default(), &explicit_two).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cycles_are_reported_with_their_path() {
        let catalog = ModuleCatalog::from_json(
            r#"{"defaultMainClass":"M","modules":[
                {"groupId":"g","artifactId":"a","version":"1","name":"A","dependencies":["g:b"]},
                {"groupId":"g","artifactId":"b","version":"1","name":"B","dependencies":["g:a"]}
            ]}"#,
        )
        .unwrap();
        let inferred: ModuleUsageSet = [catalog.lookup("g", "a").unwrap().clone()]
            .into_iter()
            .collect();

        match compute_closure(&catalog, &[], &inferred, &[]).unwrap_err() {
            LauncherError::CatalogIntegrity { cycle } => {
                assert_eq!(cycle, vec!["g:a", "g:b", "g:a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct FakeResolver;

    #[async_trait]
    impl CoordinateResolver for FakeResolver {
        async fn resolve_all(
            &self,
            artifacts: &[MavenArtifact],
        ) -> LauncherResult<Vec<ResolvedArtifact>> {
            let mut out: Vec<ResolvedArtifact> = artifacts
                .iter()
                .map(|a| ResolvedArtifact {
                    artifact: a.clone(),
                    file: PathBuf::from(format!("/repo/{}", a.filename())),
                })
                .collect();
            // A transitive hit that clashes with a declared entry.
            out.push(ResolvedArtifact {
                artifact: MavenArtifact::new("com.example", "lib", "0.1"),
                file: PathBuf::from("/repo/lib-0.1.jar"),
            });
            out.push(ResolvedArtifact {
                artifact: MavenArtifact::new("com.example", "extra", "1.0"),
                file: PathBuf::from("/repo/extra-1.0.jar"),
            });
            Ok(out)
        }
    }

    #[tokio::test]
    async fn resolve_keeps_declared_files_and_closure_versions() {
        let dir = tempfile::tempdir().unwrap();
        let lib_jar = dir.path().join("lib-1.0.jar");
        std::fs::write(&lib_jar, b"jar").unwrap();

        let catalog = catalog();
        let existing =
            vec![declared("com.example:lib:1.0", DependencyScope::Compile).with_file(&lib_jar)];
        let explicit = vec![catalog.lookup("g", "container").unwrap().clone()];
        let closure =
            compute_closure(&catalog, &existing, &ModuleUsageSet::default(), &explicit).unwrap();

        let resolved = closure.resolve(&FakeResolver).await.unwrap();
        let files: Vec<PathBuf> = resolved.iter().map(|r| r.file.clone()).collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/repo/extra-1.0.jar"),
                dir.path().join("lib-1.0.jar"),
                PathBuf::from("/repo/container-1.0.jar"),
            ]
        );
    }

    #[test]
    fn declared_only_keeps_bootstrap_and_drops_non_runtime_entries() {
        let closure = DependencyClosure::declared_only(&[
            declared("com.example:lib:1.0", DependencyScope::Compile),
            declared("dev.launchpad:bootstrap:1.4.0", DependencyScope::Compile),
            declared("org.jboss.logmanager:jboss-logmanager:2.0", DependencyScope::Compile),
            declared("javax:javaee-api:7.0", DependencyScope::Provided),
            declared("junit:junit:4.12", DependencyScope::Test),
        ]);
        assert_eq!(
            closure.to_coordinates(),
            vec!["com.example:lib:1.0", "dev.launchpad:bootstrap:1.4.0"]
        );
        assert!(closure.modules().is_empty());
    }
}
