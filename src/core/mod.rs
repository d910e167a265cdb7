// ─── Launchpad Core ───
// Detects which runtime modules a packaged JVM application needs, resolves
// them into a classpath and supervises the resulting process.
//
// Architecture:
//   core/
//     catalog/    - Module descriptors, dependency edges, one-time load
//     analyzer/   - Archive/directory scanning for module triggers
//     closure/    - Module expansion + declared dependency union
//     maven/      - Coordinate parser, POM model, repository resolver
//     downloader/ - Downloads with SHA-1 validation
//     project/    - Build metadata of the launched project
//     launch/     - Packaging kinds + launch configuration builder
//     java/       - Java binary selection
//     supervisor/ - Spawn, readiness, graceful stop with forced fallback
//     state/      - Persisted launcher settings

pub mod analyzer;
pub mod catalog;
pub mod closure;
pub mod downloader;
pub mod error;
pub mod java;
pub mod launch;
pub mod maven;
pub mod project;
pub mod state;
pub mod supervisor;
