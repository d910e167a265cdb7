use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::artifact::{ArtifactKey, MavenArtifact, ResolvedArtifact};
use super::pom::PomDocument;
use crate::core::downloader::{parse_sha1_sidecar, Downloader};
use crate::core::error::{LauncherError, LauncherResult};

/// Version shown for a transitive dependency whose POM leaves it open.
pub const UNKNOWN_VERSION: &str = "?";

/// Turns coordinates into local files.
///
/// Implementations must report every coordinate they could not resolve in a
/// single [`LauncherError::Resolution`] rather than stopping at the first.
#[async_trait]
pub trait CoordinateResolver: Send + Sync {
    async fn resolve_all(
        &self,
        artifacts: &[MavenArtifact],
    ) -> LauncherResult<Vec<ResolvedArtifact>>;
}

/// Resolves artifacts against a local Maven repository, downloading missing
/// ones from the configured remote repositories.
pub struct MavenResolver {
    /// Ordered list of repository base URLs to search.
    pub repositories: Vec<String>,
    /// Root of the local repository (`~/.m2/repository` layout).
    pub local_repository: PathBuf,
    /// Follow runtime-scope POM dependencies of every resolved artifact.
    pub transitive: bool,
    /// Validate downloads against the remote `.sha1` sidecar when present.
    pub verify_checksums: bool,
    concurrency: usize,
    downloader: Downloader,
}

impl MavenResolver {
    pub fn new(
        local_repository: PathBuf,
        repositories: Vec<String>,
        downloader: Downloader,
    ) -> Self {
        Self {
            repositories,
            local_repository,
            transitive: false,
            verify_checksums: true,
            concurrency: 8,
            downloader,
        }
    }

    pub fn transitive(mut self, transitive: bool) -> Self {
        self.transitive = transitive;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Resolve one artifact to a local file: local repository first, then
    /// each remote repository in order.
    pub async fn resolve_one(&self, artifact: &MavenArtifact) -> LauncherResult<PathBuf> {
        let dest = self.local_repository.join(artifact.local_path());
        if dest.is_file() {
            return Ok(dest);
        }

        self.try_download(artifact, &dest).await?;
        debug!("Resolved {} from remote repository", artifact);
        Ok(dest)
    }

    /// Try each repository until a successful download occurs.
    async fn try_download(&self, artifact: &MavenArtifact, dest: &Path) -> LauncherResult<()> {
        let mut last_err: Option<LauncherError> = None;

        for repo in &self.repositories {
            let url = artifact.url(repo);
            let expected_sha1 = if self.verify_checksums {
                match self.downloader.fetch_text(&format!("{}.sha1", url)).await {
                    Ok(Some(raw)) => parse_sha1_sidecar(&raw),
                    Ok(None) => None,
                    Err(e) => {
                        debug!("Checksum lookup failed for {}: {}", url, e);
                        None
                    }
                }
            } else {
                None
            };

            match self
                .downloader
                .download_file(&url, dest, expected_sha1.as_deref())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Repository {} failed for {}: {}", repo, artifact, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            LauncherError::Other(format!("No repository provides {}", artifact))
        }))
    }

    /// Resolve a batch concurrently, splitting successes from failures.
    async fn resolve_level(
        &self,
        level: Vec<MavenArtifact>,
    ) -> (Vec<ResolvedArtifact>, Vec<MavenArtifact>) {
        let results: Vec<_> = stream::iter(level)
            .map(|artifact| async move {
                let result = self.resolve_one(&artifact).await;
                (artifact, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut resolved = Vec::new();
        let mut failed = Vec::new();
        for (artifact, result) in results {
            match result {
                Ok(file) => resolved.push(ResolvedArtifact { artifact, file }),
                Err(e) => {
                    warn!("Cannot resolve {}: {}", artifact, e);
                    failed.push(artifact);
                }
            }
        }
        (resolved, failed)
    }

    /// Runtime dependencies declared by the artifact's POM, and the
    /// coordinates that could not be followed. A POM that is missing or
    /// unreadable is itself unresolved; a dependency whose version the POM
    /// leaves open is reported with [`UNKNOWN_VERSION`].
    async fn pom_children(
        &self,
        artifact: &MavenArtifact,
    ) -> (Vec<MavenArtifact>, Vec<MavenArtifact>) {
        let mut pom_artifact = artifact.with_packaging("pom");
        pom_artifact.classifier = None;
        let pom_path = match self.resolve_one(&pom_artifact).await {
            Ok(path) => path,
            Err(e) => {
                warn!("POM not available for {}: {}", artifact, e);
                return (vec![], vec![pom_artifact]);
            }
        };

        let content = match tokio::fs::read_to_string(&pom_path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read POM {:?}: {}", pom_path, e);
                return (vec![], vec![pom_artifact]);
            }
        };

        let pom = match PomDocument::parse(&content) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to parse POM for {}: {}", artifact, e);
                return (vec![], vec![pom_artifact]);
            }
        };

        let mut children = Vec::new();
        let mut unresolved = Vec::new();
        for dep in pom.runtime_dependencies() {
            let packaging = dep.dep_type.clone().unwrap_or_else(|| "jar".to_string());
            let Some(version) = pom.resolve_version(&dep) else {
                warn!(
                    "{} depends on {}:{} without a resolvable version",
                    artifact, dep.group_id, dep.artifact_id
                );
                unresolved.push(MavenArtifact {
                    group_id: dep.group_id,
                    artifact_id: dep.artifact_id,
                    version: UNKNOWN_VERSION.to_string(),
                    classifier: dep.classifier,
                    packaging,
                });
                continue;
            };
            children.push(MavenArtifact {
                group_id: dep.group_id,
                artifact_id: dep.artifact_id,
                version,
                classifier: dep.classifier,
                packaging,
            });
        }
        (children, unresolved)
    }
}

#[async_trait]
impl CoordinateResolver for MavenResolver {
    async fn resolve_all(
        &self,
        artifacts: &[MavenArtifact],
    ) -> LauncherResult<Vec<ResolvedArtifact>> {
        // Requested coordinates win over anything discovered transitively;
        // among transitive ones the first (nearest) version wins.
        let mut seen: HashSet<ArtifactKey> = artifacts.iter().map(MavenArtifact::key).collect();
        let mut frontier: Vec<MavenArtifact> = artifacts.to_vec();
        frontier.sort();
        frontier.dedup();

        let mut resolved_all = Vec::new();
        let mut unresolved = Vec::new();

        while !frontier.is_empty() {
            let (resolved, failed) = self.resolve_level(std::mem::take(&mut frontier)).await;
            unresolved.extend(failed);

            if self.transitive {
                let mut ordered: Vec<&ResolvedArtifact> = resolved.iter().collect();
                ordered.sort_by(|a, b| a.artifact.cmp(&b.artifact));
                for parent in ordered {
                    if parent.artifact.is_pom() {
                        continue;
                    }
                    let (children, unfollowed) = self.pom_children(&parent.artifact).await;
                    unresolved.extend(unfollowed);
                    for child in children {
                        if seen.insert(child.key()) {
                            frontier.push(child);
                        }
                    }
                }
            }

            resolved_all.extend(resolved);
        }

        if !unresolved.is_empty() {
            unresolved.sort();
            return Err(LauncherError::Resolution { unresolved });
        }

        resolved_all.retain(|r| !r.artifact.is_pom());
        resolved_all.sort_by(|a, b| a.artifact.cmp(&b.artifact));
        info!("Resolved {} artifacts", resolved_all.len());
        Ok(resolved_all)
    }
}
