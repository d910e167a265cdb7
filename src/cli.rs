use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands;
use crate::core::error::{FailureCause, LaunchPhase, LauncherError, LauncherResult, PhaseExt};
use crate::core::launch::LaunchOptions;
use crate::core::project::ProjectMetadata;
use crate::core::state::{default_data_dir, load_settings, LauncherSettings};
use crate::core::supervisor::ProcessState;

/// Launchpad - detects, resolves and supervises packaged JVM applications
#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(version)]
pub struct Cli {
    /// Directory holding launcher_settings.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyse, resolve and launch an application, then supervise it
    Start(StartArgs),
    /// Print the modules an archive or class directory uses
    Detect {
        /// Archive (.jar/.war) or exploded class directory
        artifact: PathBuf,
    },
    /// List the module catalog
    Modules,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Project metadata exported by the build (JSON)
    #[arg(short, long)]
    pub project: PathBuf,

    /// Extra module: name, group:name or group:name:version
    #[arg(short, long = "module")]
    pub modules: Vec<String>,

    /// Extra module directory, relative to the output directory
    #[arg(long = "module-path")]
    pub module_paths: Vec<PathBuf>,

    /// JVM argument, e.g. --jvm-arg=-Xmx1g
    #[arg(long = "jvm-arg", allow_hyphen_values = true)]
    pub jvm_args: Vec<String>,

    /// System property KEY=VALUE
    #[arg(short = 'D', long = "property", value_parser = parse_key_value)]
    pub properties: Vec<(String, String)>,

    /// Environment variable KEY=VALUE for the application
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub environment: Vec<(String, String)>,

    /// Entry point instead of the runtime's default main class
    #[arg(long)]
    pub main_class: Option<String>,

    /// Suspend the JVM and listen for a debugger on this port
    #[arg(long)]
    pub debug: Option<u16>,

    /// Write application stdout to this file
    #[arg(long)]
    pub stdout: Option<PathBuf>,

    /// Write application stderr to this file
    #[arg(long)]
    pub stderr: Option<PathBuf>,

    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Run the executable archive instead of a resolved classpath
    #[arg(long)]
    pub executable_archive: bool,

    /// Block until the application exits; an interrupt then fails the run
    #[arg(long)]
    pub wait: bool,

    /// Seconds to wait for readiness (overrides settings)
    #[arg(long)]
    pub readiness_timeout: Option<u64>,

    /// Seconds between the termination request and a forced kill
    #[arg(long)]
    pub grace_period: Option<u64>,

    /// Java binary or installation directory (overrides settings)
    #[arg(long)]
    pub java: Option<PathBuf>,

    /// Arguments passed to the application
    #[arg(last = true)]
    pub app_args: Vec<String>,
}

impl StartArgs {
    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            modules: self.modules.clone(),
            module_paths: self.module_paths.clone(),
            jvm_args: self.jvm_args.clone(),
            app_args: self.app_args.clone(),
            properties: self.properties.iter().cloned().collect::<BTreeMap<_, _>>(),
            environment: self.environment.iter().cloned().collect::<BTreeMap<_, _>>(),
            main_class: self.main_class.clone(),
            debug_port: self.debug,
            stdout_file: self.stdout.clone(),
            stderr_file: self.stderr.clone(),
            working_directory: self.working_dir.clone(),
            use_executable_archive: self.executable_archive,
            wait_for_exit: self.wait,
        }
    }

    fn apply_overrides(&self, settings: &mut LauncherSettings) {
        if let Some(secs) = self.readiness_timeout {
            settings.readiness_timeout_secs = secs;
        }
        if let Some(secs) = self.grace_period {
            settings.grace_period_secs = secs;
        }
        if let Some(java) = &self.java {
            settings.java_path = Some(java.clone());
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

/// Exit status for a failed run, one per failure cause.
pub fn exit_code_for(err: &LauncherError) -> ExitCode {
    ExitCode::from(exit_status(err.cause()))
}

fn exit_status(cause: FailureCause) -> u8 {
    match cause {
        FailureCause::Unresolvable => 2,
        FailureCause::NeverStarted => 3,
        FailureCause::NeverReady => 4,
        FailureCause::Interrupted => 130,
        FailureCause::Other => 1,
    }
}

pub async fn execute(cli: Cli) -> LauncherResult<ExitCode> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let mut settings = load_settings(&data_dir);

    match cli.command {
        Command::Start(args) => {
            args.apply_overrides(&mut settings);
            start(&settings, &args).await
        }
        Command::Detect { artifact } => {
            let detected = commands::detect_modules(&settings, &artifact)?;
            if detected.is_empty() {
                println!("No modules detected in {}", artifact.display());
            }
            for module in detected.iter() {
                println!("{}\t{}", module.key(), module.display_name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Modules => {
            for module in commands::list_modules(&settings)? {
                println!(
                    "{}\t{}\t{}",
                    module.gav(),
                    module.display_name,
                    module.description
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn start(settings: &LauncherSettings, args: &StartArgs) -> LauncherResult<ExitCode> {
    let project = ProjectMetadata::load(&args.project).phase(LaunchPhase::Configuration)?;
    let options = args.launch_options();

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_shutdown_signal().await;
            shutdown.cancel();
        }
    });

    // The shutdown hook is armed inside the launch, before readiness.
    let process = commands::start_application(settings, &project, &options, &shutdown).await?;

    if options.wait_for_exit {
        process.wait_for(&shutdown).await?;
    } else {
        info!("Application running, press Ctrl-C to stop it");
        let mut state = process.subscribe_state();
        let _ = state.wait_for(|s| s.is_terminal()).await;
    }

    match process.state() {
        ProcessState::Failed => {
            let err = process
                .get_error()
                .map(LauncherError::from)
                .unwrap_or_else(|| LauncherError::Other("application failed".into()));
            Err(err)
        }
        state => {
            info!("Application {}", state);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Resolves on SIGINT/SIGTERM (Ctrl-C elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    }
}
