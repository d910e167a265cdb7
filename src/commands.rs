//! Entry points the CLI drives: the orchestrated launch and the two
//! inspection commands.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::analyzer::{self, ModuleUsageSet};
use crate::core::catalog::{ModuleCatalog, ModuleDescriptor};
use crate::core::closure::{self, DependencyClosure};
use crate::core::downloader::Downloader;
use crate::core::error::{LaunchPhase, LauncherError, LauncherResult, PhaseExt};
use crate::core::java;
use crate::core::launch::{
    self, ApplicationArtifact, LaunchConfiguration, LaunchOptions, PackagingKind,
};
use crate::core::maven::{CoordinateResolver, MavenResolver, ResolvedArtifact};
use crate::core::project::ProjectMetadata;
use crate::core::state::LauncherSettings;
use crate::core::supervisor::{ProcessSupervisor, SupervisedProcess};

/// Collaborators a launch runs against.
pub struct LaunchContext<'a> {
    pub settings: &'a LauncherSettings,
    pub catalog: &'a ModuleCatalog,
    pub resolver: &'a dyn CoordinateResolver,
    pub java: PathBuf,
}

/// Launch `project` with the configured catalog, a Maven resolver over the
/// local and remote repositories, and the Java binary the settings point at.
pub async fn start_application(
    settings: &LauncherSettings,
    project: &ProjectMetadata,
    options: &LaunchOptions,
    shutdown: &CancellationToken,
) -> LauncherResult<SupervisedProcess> {
    let catalog =
        ModuleCatalog::load_from(&settings.catalog_source()).phase(LaunchPhase::Analysis)?;

    let downloader = Downloader::new().phase(LaunchPhase::Resolution)?;
    let mut resolver = MavenResolver::new(
        settings.local_repository.clone(),
        settings.repositories_for(&project.repositories),
        downloader,
    )
    .with_concurrency(settings.download_concurrency)
    .transitive(settings.transitive_resolution);
    resolver.verify_checksums = settings.verify_checksums;

    let java = java::resolve_java_binary(settings.java_path.as_deref())
        .phase(LaunchPhase::Configuration)?;
    let probe = {
        let java = java.clone();
        tokio::task::spawn_blocking(move || java::probe_java(&java)).await
    };
    match probe {
        Ok(Some(_)) => {}
        Ok(None) => debug!("Could not determine the version of {:?}", java),
        Err(e) => warn!("Java version probe failed: {}", e),
    }

    let ctx = LaunchContext {
        settings,
        catalog,
        resolver: &resolver,
        java,
    };
    launch_with(&ctx, project, options, shutdown).await
}

/// Build the launch configuration, spawn it and wait for readiness.
///
/// The shutdown hook is armed as soon as the process exists, so a host
/// shutdown while waiting for readiness stops the application gracefully.
/// A process that fails to become ready is stopped before the error is
/// returned, so the caller only ever holds a handle to a running process.
pub async fn launch_with(
    ctx: &LaunchContext<'_>,
    project: &ProjectMetadata,
    options: &LaunchOptions,
    shutdown: &CancellationToken,
) -> LauncherResult<SupervisedProcess> {
    let config = tokio::select! {
        config = prepare_launch(ctx, project, options) => config?,
        () = shutdown.cancelled() => return Err(LauncherError::InterruptedWait),
    };

    let process = ProcessSupervisor::new(ctx.settings.supervisor_options())
        .launch(&config)
        .await
        .phase(LaunchPhase::Spawn)?;
    process.install_shutdown_hook(shutdown.clone());

    let readiness = tokio::select! {
        ready = process.await_readiness(ctx.settings.readiness_timeout()) => ready,
        () = shutdown.cancelled() => {
            warn!(launch_id = %process.launch_id(), "Interrupted before the application became ready, stopping it");
            process
                .stop(ctx.settings.grace_period())
                .await
                .phase(LaunchPhase::Shutdown)?;
            Err(LauncherError::InterruptedWait)
        }
    };

    if let Err(err) = readiness.phase(LaunchPhase::Readiness) {
        if process.is_alive() {
            warn!(launch_id = %process.launch_id(), "Stopping application that failed to start");
            process
                .stop(ctx.settings.grace_period())
                .await
                .phase(LaunchPhase::Shutdown)?;
        }
        return Err(err);
    }

    info!(
        launch_id = %process.launch_id(),
        pid = ?process.pid(),
        "Application {} is running",
        project.final_name
    );
    Ok(process)
}

/// Everything up to the spawn: packaging selection, module analysis,
/// dependency resolution and command assembly.
pub async fn prepare_launch(
    ctx: &LaunchContext<'_>,
    project: &ProjectMetadata,
    options: &LaunchOptions,
) -> LauncherResult<LaunchConfiguration> {
    let kind = PackagingKind::select(&project.packaging, options.use_executable_archive)
        .phase(LaunchPhase::Configuration)?;
    let app = kind.application(project);
    info!("Launching {} as {}", app.name, kind);

    let resolved: Vec<ResolvedArtifact> = if kind.needs_classpath() {
        let closure = compute_launch_closure(ctx.catalog, project, &app, options)?;
        let resolved = closure
            .resolve(ctx.resolver)
            .await
            .phase(LaunchPhase::Resolution)?;
        debug!("Resolved {} runtime artifacts", resolved.len());
        resolved
    } else {
        Vec::new()
    };

    launch::build(
        kind,
        &app,
        &resolved,
        project,
        options,
        &ctx.settings.repositories_for(&project.repositories),
        ctx.catalog.default_main_class(),
        ctx.java.clone(),
    )
    .phase(LaunchPhase::Configuration)
}

/// The coordinate set for a classpath launch.
///
/// A project that declares the bootstrap artifact has already chosen its
/// modules, so only its declared dependencies are used. Otherwise the
/// application is analysed and the detected modules, together with the
/// ones requested in `options`, are expanded over the catalog.
pub fn compute_launch_closure(
    catalog: &ModuleCatalog,
    project: &ProjectMetadata,
    app: &ApplicationArtifact,
    options: &LaunchOptions,
) -> LauncherResult<DependencyClosure> {
    if project.declares_bootstrap() {
        info!("Project declares the bootstrap artifact, skipping module detection");
        return Ok(DependencyClosure::declared_only(&project.dependencies));
    }

    info!("No bootstrap artifact declared, scanning {:?} for used modules", app.path);
    let detected = analyzer::analyze_path(catalog, &app.path).phase(LaunchPhase::Analysis)?;
    let explicit = options
        .modules
        .iter()
        .map(|reference| catalog.resolve_reference(reference))
        .collect::<LauncherResult<Vec<_>>>()
        .phase(LaunchPhase::Analysis)?;

    let closure = closure::compute_closure(catalog, &project.dependencies, &detected, &explicit)
        .phase(LaunchPhase::Resolution)?;
    report_modules(&detected, &closure);
    Ok(closure)
}

fn report_modules(detected: &ModuleUsageSet, closure: &DependencyClosure) {
    if detected.is_empty() {
        info!("Detected modules: none");
    } else {
        info!("Detected modules:");
        for module in detected.iter() {
            info!("  - {}", module.key());
        }
    }
    info!("Using modules:");
    for key in closure.modules() {
        info!("  - {}", key);
    }
}

/// Run usage analysis on an archive or class directory.
pub fn detect_modules(settings: &LauncherSettings, path: &Path) -> LauncherResult<ModuleUsageSet> {
    let catalog = ModuleCatalog::load_from(&settings.catalog_source())?;
    analyzer::analyze_path(catalog, path)
}

/// Every module in the configured catalog, in key order.
pub fn list_modules(settings: &LauncherSettings) -> LauncherResult<Vec<ModuleDescriptor>> {
    let catalog = ModuleCatalog::load_from(&settings.catalog_source())?;
    Ok(catalog.all().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{FailureCause, LauncherError};
    use crate::core::maven::MavenArtifact;
    use crate::core::project::{DeclaredDependency, DependencyScope};

    fn catalog() -> ModuleCatalog {
        ModuleCatalog::from_json(
            r#"{
                "defaultMainClass": "dev.launchpad.runtime.Main",
                "modules": [
                    {"groupId":"g","artifactId":"core","version":"1.0","name":"Core"},
                    {"groupId":"g","artifactId":"web","version":"1.0","name":"Web",
                     "dependencies":["g:core"],
                     "triggers":{"classes":["javax/servlet/"]}}
                ]
            }"#,
        )
        .unwrap()
    }

    fn project(dir: &Path, packaging: &str) -> ProjectMetadata {
        ProjectMetadata {
            final_name: "shop".into(),
            packaging: packaging.into(),
            base_directory: dir.to_path_buf(),
            build_directory: dir.join("target"),
            output_directory: dir.join("target").join("classes"),
            ..ProjectMetadata::default()
        }
    }

    #[test]
    fn bootstrap_projects_skip_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project(dir.path(), "war");
        project.dependencies = vec![
            DeclaredDependency::new(
                MavenArtifact::parse("dev.launchpad:bootstrap:1.4.0").unwrap(),
                DependencyScope::Compile,
            ),
            DeclaredDependency::new(
                MavenArtifact::parse("com.example:lib:2.0").unwrap(),
                DependencyScope::Compile,
            ),
        ];
        let app = PackagingKind::WebArchive.application(&project);

        // The war does not exist; analysing it would fail.
        let closure =
            compute_launch_closure(&catalog(), &project, &app, &LaunchOptions::default()).unwrap();
        assert_eq!(
            closure.to_coordinates(),
            vec!["com.example:lib:2.0", "dev.launchpad:bootstrap:1.4.0"]
        );
        assert!(closure.modules().is_empty());
    }

    #[test]
    fn detected_modules_are_expanded_over_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "jar");
        let classes = project.output_directory.join("com").join("example");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(
            classes.join("Endpoint.class"),
            b"\xca\xfe\xba\xbe....javax/servlet/http/HttpServlet....",
        )
        .unwrap();
        let app = PackagingKind::PlainClasses.application(&project);

        let closure =
            compute_launch_closure(&catalog(), &project, &app, &LaunchOptions::default()).unwrap();
        assert_eq!(closure.to_coordinates(), vec!["g:core:1.0", "g:web:1.0"]);
    }

    #[test]
    fn unreadable_application_is_an_analysis_failure() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "war");
        let app = PackagingKind::WebArchive.application(&project);

        let err = compute_launch_closure(&catalog(), &project, &app, &LaunchOptions::default())
            .unwrap_err();
        assert_eq!(err.phase(), Some(LaunchPhase::Analysis));
        assert_eq!(err.cause(), FailureCause::Unresolvable);
    }

    #[test]
    fn unknown_module_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path(), "jar");
        std::fs::create_dir_all(&project.output_directory).unwrap();
        let app = PackagingKind::PlainClasses.application(&project);
        let options = LaunchOptions {
            modules: vec!["nosuch".into()],
            ..LaunchOptions::default()
        };

        let err = compute_launch_closure(&catalog(), &project, &app, &options).unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Phase { ref source, .. }
                if matches!(**source, LauncherError::ModuleNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn java_probe_does_not_stall_the_runtime() {
        use std::os::unix::fs::PermissionsExt;
        use std::sync::{Arc, Mutex};
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let java = dir.path().join("java");
        std::fs::write(&java, "#!/bin/sh\nsleep 1\necho 'openjdk version \"17.0.9\"' >&2\n")
            .unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

        let settings = LauncherSettings {
            java_path: Some(java),
            ..LauncherSettings::default()
        };
        // Rejected after the Java version check, before anything is resolved.
        let project = project(dir.path(), "ear");

        let ticked = Arc::new(Mutex::new(None));
        let ticker = tokio::spawn({
            let ticked = ticked.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                *ticked.lock().unwrap() = Some(Instant::now());
            }
        });

        let result = start_application(
            &settings,
            &project,
            &LaunchOptions::default(),
            &CancellationToken::new(),
        )
        .await;
        let finished = Instant::now();
        ticker.await.unwrap();

        assert!(matches!(
            result.err().map(|e| e.phase()),
            Some(Some(LaunchPhase::Configuration))
        ));
        let ticked = ticked.lock().unwrap().unwrap();
        assert!(ticked + Duration::from_millis(500) < finished);
    }

    #[test]
    fn builtin_catalog_lists_every_module() {
        let modules = list_modules(&LauncherSettings::default()).unwrap();
        assert!(modules.len() > 20);
        assert!(modules.iter().any(|m| m.artifact_id == "undertow"));
    }
}
