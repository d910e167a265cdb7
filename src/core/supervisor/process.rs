use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::forwarder::{spawn_stream_forwarder, OutputSink, StreamKind};
use super::signal::send_terminate_signal;
use super::{ProcessState, SupervisorOptions, SHUTDOWN_HOOK_DELAY};
use crate::core::error::{LauncherError, LauncherResult, ProcessFailure};
use crate::core::launch::LaunchConfiguration;

use ProcessState::*;

/// How the child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(ExitStatus),
    /// Waiting on the child failed; its real status is unknown.
    WaitFailed(String),
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        matches!(self, ProcessExit::Exited(status) if status.success())
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessExit::Exited(status) => write!(f, "{status}"),
            ProcessExit::WaitFailed(reason) => write!(f, "unknown status ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

enum StartupOutcome {
    Ready,
    Failed(ProcessFailure),
    Interrupted,
}

/// Launches exactly one process.
pub struct ProcessSupervisor {
    options: SupervisorOptions,
    state: watch::Sender<ProcessState>,
}

impl ProcessSupervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        let (state, _) = watch::channel(Idle);
        Self { options, state }
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Spawn the configured command and start watching it. The returned
    /// handle is in `AwaitingReadiness`; pair with
    /// [`SupervisedProcess::await_readiness`].
    pub async fn launch(self, config: &LaunchConfiguration) -> LauncherResult<SupervisedProcess> {
        let ProcessSupervisor { options, state } = self;
        let launch_id = Uuid::new_v4();
        state.send_replace(Spawning);

        let (mut child, stdout_sink, stderr_sink) = match spawn_child(config).await {
            Ok(parts) => parts,
            Err(e) => {
                state.send_replace(Failed);
                return Err(e);
            }
        };

        let pid = child.id();
        state.send_replace(AwaitingReadiness);

        let shared = Arc::new(Shared {
            launch_id,
            pid,
            options,
            state,
            readiness: watch::channel(Readiness::Pending).0,
            exit: watch::channel(None).0,
            error: Mutex::new(None),
            kill: Notify::new(),
            forced_kill: AtomicBool::new(false),
            stop_done: tokio::sync::Mutex::new(false),
        });

        if let Some(stdout) = child.stdout.take() {
            spawn_stream_forwarder(stdout, StreamKind::Stdout, stdout_sink, shared.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_forwarder(stderr, StreamKind::Stderr, stderr_sink, shared.clone());
        }
        spawn_reaper(child, shared.clone());

        info!(launch_id = %launch_id, pid = ?pid, "Spawned application process");
        Ok(SupervisedProcess { shared })
    }
}

async fn spawn_child(
    config: &LaunchConfiguration,
) -> LauncherResult<(Child, OutputSink, OutputSink)> {
    if let Some(archive) = &config.executable_archive {
        if !archive.is_file() {
            return Err(LauncherError::Spawn {
                program: archive.clone(),
                reason: "executable archive not found".into(),
            });
        }
    }

    let mut cmd = Command::new(&config.java);
    cmd.args(config.command_args())
        .envs(&config.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &config.working_directory {
        if !dir.is_dir() {
            return Err(LauncherError::Spawn {
                program: config.java.clone(),
                reason: format!("working directory {} does not exist", dir.display()),
            });
        }
        cmd.current_dir(dir);
    }

    let stdout_sink = OutputSink::open(config.stdout_file.as_deref(), StreamKind::Stdout).await?;
    let stderr_sink = OutputSink::open(config.stderr_file.as_deref(), StreamKind::Stderr).await?;

    info!("Launching: {}", config.format_command());
    let child = cmd.spawn().map_err(|e| LauncherError::Spawn {
        program: config.java.clone(),
        reason: e.to_string(),
    })?;

    Ok((child, stdout_sink, stderr_sink))
}

fn spawn_reaper(mut child: Child, shared: Arc<Shared>) {
    tokio::spawn(async move {
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = shared.kill.notified() => None,
        };

        let status = match waited {
            Some(status) => status,
            None => {
                if let Err(e) = child.start_kill() {
                    warn!(launch_id = %shared.launch_id, error = %e, "Force kill failed");
                }
                child.wait().await
            }
        };

        let exit = match status {
            Ok(status) => ProcessExit::Exited(status),
            Err(e) => ProcessExit::WaitFailed(e.to_string()),
        };
        info!(launch_id = %shared.launch_id, "Application process exited: {}", exit);
        shared.on_exit(exit);
    });
}

/// State shared by the handle, the output forwarders and the reaper task.
pub(super) struct Shared {
    launch_id: Uuid,
    pid: Option<u32>,
    options: SupervisorOptions,
    state: watch::Sender<ProcessState>,
    readiness: watch::Sender<Readiness>,
    exit: watch::Sender<Option<ProcessExit>>,
    error: Mutex<Option<ProcessFailure>>,
    kill: Notify,
    forced_kill: AtomicBool,
    /// Serializes stop sequences; `true` once one has completed.
    stop_done: tokio::sync::Mutex<bool>,
}

impl Shared {
    pub(super) fn launch_id(&self) -> Uuid {
        self.launch_id
    }

    fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    fn error(&self) -> Option<ProcessFailure> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keep the first failure; later ones are consequences of it.
    fn record_failure(&self, failure: ProcessFailure) {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            warn!(launch_id = %self.launch_id, "{}", failure);
            *slot = Some(failure);
        }
    }

    fn transition(&self, to: ProcessState, from: &[ProcessState]) -> bool {
        let launch_id = self.launch_id;
        self.state.send_if_modified(|current| {
            if !from.contains(current) {
                return false;
            }
            debug!(launch_id = %launch_id, "Process state {} -> {}", current, to);
            *current = to;
            true
        })
    }

    fn fail(&self, failure: ProcessFailure, from: &[ProcessState]) -> bool {
        self.state.send_if_modified(|current| {
            if !from.contains(current) {
                return false;
            }
            self.record_failure(failure);
            *current = Failed;
            true
        })
    }

    pub(super) fn observe_line(&self, line: &str) {
        let probe = &self.options.probe;
        if !probe.ready_marker.is_empty() && line.contains(probe.ready_marker.as_str()) {
            self.readiness.send_if_modified(|readiness| {
                if *readiness != Readiness::Pending {
                    return false;
                }
                *readiness = Readiness::Ready;
                true
            });
        } else if probe
            .error_markers
            .iter()
            .any(|marker| !marker.is_empty() && line.contains(marker.as_str()))
        {
            let message = line.trim().to_string();
            self.record_failure(ProcessFailure::Internal(message.clone()));
            self.readiness.send_if_modified(|readiness| {
                if *readiness != Readiness::Pending {
                    return false;
                }
                *readiness = Readiness::Failed(message);
                true
            });
        }
    }

    fn on_exit(&self, exit: ProcessExit) {
        let was_ready = *self.readiness.borrow() == Readiness::Ready;
        self.state.send_if_modified(|current| {
            let next = match *current {
                AwaitingReadiness | Running
                    if (*current == Running || was_ready) && exit.success() =>
                {
                    Stopped
                }
                AwaitingReadiness | Running => {
                    self.record_failure(ProcessFailure::Exited {
                        status: exit.to_string(),
                    });
                    Failed
                }
                _ => return false,
            };
            debug!(launch_id = %self.launch_id, "Process state {} -> {}", current, next);
            *current = next;
            true
        });
        self.exit.send_replace(Some(exit));
    }

    async fn wait_exit(&self) {
        let mut exit = self.exit.subscribe();
        let _ = exit.wait_for(Option::is_some).await;
    }

    async fn force_kill(&self) {
        self.forced_kill.store(true, Ordering::SeqCst);
        self.kill.notify_one();
        self.wait_exit().await;
    }

    /// Close out a stop once the child is gone.
    fn settle_stopped(&self) {
        let exit = self.exit.borrow().clone();
        match exit {
            Some(ProcessExit::WaitFailed(reason)) => {
                self.fail(
                    ProcessFailure::Internal(format!("could not confirm termination: {reason}")),
                    &[Stopping],
                );
            }
            _ => {
                self.transition(Stopped, &[Stopping]);
            }
        }
    }

    async fn stop_sequence(&self, grace: Duration) {
        let mut done = self.stop_done.lock().await;
        if *done {
            return;
        }

        if !self.has_exited() {
            self.transition(Stopping, &[Spawning, AwaitingReadiness, Running]);
            let sent = send_terminate_signal(self.pid);
            info!(
                launch_id = %self.launch_id,
                pid = ?self.pid,
                graceful = sent,
                "Stopping application process"
            );

            let exited = if sent {
                tokio::time::timeout(grace, self.wait_exit()).await.is_ok()
            } else {
                false
            };

            if exited {
                info!(launch_id = %self.launch_id, "Application exited within the grace period");
            } else {
                warn!(
                    launch_id = %self.launch_id,
                    grace_ms = grace.as_millis() as u64,
                    "Grace period expired, force killing"
                );
                self.force_kill().await;
            }
        }

        self.settle_stopped();
        *done = true;
    }
}

/// Handle to a launched process. Clones share the same process.
#[derive(Clone)]
pub struct SupervisedProcess {
    shared: Arc<Shared>,
}

impl fmt::Debug for SupervisedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("launch_id", &self.shared.launch_id)
            .field("pid", &self.shared.pid)
            .field("state", &self.state())
            .finish()
    }
}

impl SupervisedProcess {
    pub fn launch_id(&self) -> Uuid {
        self.shared.launch_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.pid
    }

    pub fn state(&self) -> ProcessState {
        self.shared.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ProcessState> {
        self.shared.state.subscribe()
    }

    pub fn is_alive(&self) -> bool {
        !self.shared.has_exited()
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        self.shared.exit.borrow().clone()
    }

    /// The first failure captured on this process. May be set while the
    /// process is still alive, e.g. after a readiness timeout or an error
    /// line printed once running.
    pub fn get_error(&self) -> Option<ProcessFailure> {
        self.shared.error()
    }

    /// Whether shutdown had to fall back to a forced kill.
    pub fn forced_kill_issued(&self) -> bool {
        self.shared.forced_kill.load(Ordering::SeqCst)
    }

    /// Wait until the application reports readiness.
    ///
    /// Fails with [`ProcessFailure::DeployTimeout`] when `timeout` elapses
    /// first; the process is then left alive in `Failed` for the caller to
    /// stop. An error line or an early exit fail the wait immediately. A stop
    /// issued meanwhile ends the wait with [`LauncherError::InterruptedWait`].
    pub async fn await_readiness(&self, timeout: Duration) -> LauncherResult<()> {
        let shared = &self.shared;
        let mut readiness = shared.readiness.subscribe();
        let mut exit = shared.exit.subscribe();
        let mut state = shared.state.subscribe();

        let waited = tokio::time::timeout(timeout, async {
            loop {
                if let Some(outcome) = self.startup_outcome() {
                    return outcome;
                }
                tokio::select! {
                    _ = readiness.changed() => {}
                    _ = exit.changed() => {}
                    _ = state.changed() => {}
                }
            }
        })
        .await;

        let outcome = match waited {
            Ok(outcome) => outcome,
            Err(_) => {
                let failure = ProcessFailure::DeployTimeout { timeout };
                if shared.fail(failure.clone(), &[AwaitingReadiness]) {
                    return Err(failure.into());
                }
                self.startup_outcome()
                    .unwrap_or(StartupOutcome::Failed(failure))
            }
        };

        match outcome {
            StartupOutcome::Ready => {
                shared.transition(Running, &[AwaitingReadiness]);
                match self.state() {
                    Running | Stopped => {
                        info!(launch_id = %shared.launch_id, "Application is ready");
                        Ok(())
                    }
                    Failed => Err(self.captured_failure().into()),
                    _ => Err(LauncherError::InterruptedWait),
                }
            }
            StartupOutcome::Failed(failure) => {
                shared.fail(failure.clone(), &[AwaitingReadiness]);
                Err(shared.error().unwrap_or(failure).into())
            }
            StartupOutcome::Interrupted => Err(LauncherError::InterruptedWait),
        }
    }

    fn startup_outcome(&self) -> Option<StartupOutcome> {
        let shared = &self.shared;
        match &*shared.readiness.borrow() {
            Readiness::Ready => return Some(StartupOutcome::Ready),
            Readiness::Failed(line) => {
                return Some(StartupOutcome::Failed(ProcessFailure::Internal(
                    line.clone(),
                )))
            }
            Readiness::Pending => {}
        }

        match shared.state() {
            Stopping | Stopped => return Some(StartupOutcome::Interrupted),
            Failed => return Some(StartupOutcome::Failed(self.captured_failure())),
            _ => {}
        }

        shared.exit.borrow().as_ref().map(|exit| {
            StartupOutcome::Failed(ProcessFailure::Exited {
                status: exit.to_string(),
            })
        })
    }

    fn captured_failure(&self) -> ProcessFailure {
        self.get_error().unwrap_or_else(|| ProcessFailure::Exited {
            status: self
                .exit()
                .map(|exit| exit.to_string())
                .unwrap_or_else(|| "unknown status".into()),
        })
    }

    /// Terminate gracefully, force killing once `grace` expires.
    ///
    /// Idempotent and safe to call concurrently: later callers wait for the
    /// first stop to finish. The sequence runs on its own task, so it
    /// completes even if the caller's future is dropped. A process that
    /// already `Failed` keeps that state.
    pub async fn stop(&self, grace: Duration) -> LauncherResult<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.stop_sequence(grace).await })
            .await
            .map_err(|e| LauncherError::Other(format!("Stop task failed: {e}")))
    }

    /// Kill immediately, without a termination signal first.
    pub async fn destroy_forcibly(&self) {
        if self.is_alive() {
            self.shared
                .transition(Stopping, &[Spawning, AwaitingReadiness, Running]);
            warn!(launch_id = %self.shared.launch_id, "Force killing application process");
            self.shared.force_kill().await;
        }
        self.shared.settle_stopped();
    }

    /// Block until the process has exited and its state settled. If
    /// `interrupt` fires first the process is stopped and the wait fails
    /// with [`LauncherError::InterruptedWait`].
    pub async fn wait_for(&self, interrupt: &CancellationToken) -> LauncherResult<ProcessState> {
        let mut state = self.shared.state.subscribe();
        let settled = async {
            self.shared.wait_exit().await;
            let _ = state.wait_for(|s| s.is_terminal()).await;
        };

        tokio::select! {
            () = settled => Ok(self.state()),
            () = interrupt.cancelled() => {
                warn!(
                    launch_id = %self.shared.launch_id,
                    "Interrupted while waiting for the application, stopping it"
                );
                self.stop(self.shared.options.grace_period).await?;
                Err(LauncherError::InterruptedWait)
            }
        }
    }

    /// Stop the process when `shutdown` is cancelled. The hook ends on its
    /// own once the process exits.
    pub fn install_shutdown_hook(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let process = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tokio::time::sleep(SHUTDOWN_HOOK_DELAY).await;
                    if process.is_alive() {
                        info!(launch_id = %process.shared.launch_id, "Host shutting down, stopping application");
                        let grace = process.shared.options.grace_period;
                        if let Err(e) = process.stop(grace).await {
                            warn!(launch_id = %process.shared.launch_id, error = %e, "Shutdown stop failed");
                        }
                    }
                }
                () = process.shared.wait_exit() => {}
            }
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;
    use std::time::Instant;

    use super::*;
    use crate::core::supervisor::ReadinessProbe;

    fn options(readiness_ms: u64, grace_ms: u64) -> SupervisorOptions {
        SupervisorOptions {
            readiness_timeout: Duration::from_millis(readiness_ms),
            grace_period: Duration::from_millis(grace_ms),
            probe: ReadinessProbe {
                ready_marker: "APP-READY".into(),
                error_markers: vec!["APP-FAILED".into()],
            },
        }
    }

    fn shell(script: &str) -> LaunchConfiguration {
        LaunchConfiguration {
            java: PathBuf::from("/bin/sh"),
            main_class: Some("-c".into()),
            app_args: vec![script.into()],
            ..LaunchConfiguration::default()
        }
    }

    async fn launch(script: &str, options: SupervisorOptions) -> SupervisedProcess {
        ProcessSupervisor::new(options)
            .launch(&shell(script))
            .await
            .unwrap()
    }

    const LONG: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn ready_marker_moves_to_running_and_stop_is_graceful() {
        let process = launch("echo APP-READY; exec sleep 30", options(10_000, 5_000)).await;
        assert_eq!(process.state(), AwaitingReadiness);

        process.await_readiness(LONG).await.unwrap();
        assert_eq!(process.state(), Running);
        assert!(process.is_alive());

        process.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(process.state(), Stopped);
        assert!(!process.is_alive());
        assert!(!process.forced_kill_issued());
        assert_eq!(process.get_error(), None);
    }

    #[tokio::test]
    async fn readiness_timeout_fails_but_leaves_process_alive() {
        let process = launch("exec sleep 30", options(200, 1_000)).await;

        let err = process
            .await_readiness(Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Process(ProcessFailure::DeployTimeout { .. })
        ));
        assert_eq!(process.state(), Failed);
        assert!(process.is_alive());
        assert!(matches!(
            process.get_error(),
            Some(ProcessFailure::DeployTimeout { .. })
        ));

        process.stop(Duration::from_secs(5)).await.unwrap();
        assert!(!process.is_alive());
        assert_eq!(process.state(), Failed);
    }

    #[tokio::test]
    async fn early_exit_fails_readiness_without_waiting_for_timeout() {
        let process = launch("exit 3", options(10_000, 1_000)).await;
        let started = Instant::now();

        let err = process.await_readiness(LONG).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            LauncherError::Process(ProcessFailure::Exited { status }) => {
                assert!(status.contains('3'), "status was {status}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(process.state(), Failed);
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn error_marker_fails_startup() {
        let process = launch("echo 'APP-FAILED: boom'; exec sleep 30", options(10_000, 1_000)).await;

        let err = process.await_readiness(LONG).await.unwrap_err();
        match err {
            LauncherError::Process(ProcessFailure::Internal(message)) => {
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(process.state(), Failed);

        process.destroy_forcibly().await;
        assert!(!process.is_alive());
        assert!(process.forced_kill_issued());
        assert_eq!(process.state(), Failed);
    }

    #[tokio::test]
    async fn errors_after_readiness_are_captured_without_failing() {
        let process = launch(
            "echo APP-READY; sleep 0.2; echo 'APP-FAILED: late'; exec sleep 30",
            options(10_000, 1_000),
        )
        .await;
        process.await_readiness(LONG).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(process.state(), Running);
        assert!(process.is_alive());
        assert!(matches!(
            process.get_error(),
            Some(ProcessFailure::Internal(ref m)) if m.contains("late")
        ));

        process.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(process.state(), Stopped);
    }

    #[tokio::test]
    async fn expired_grace_period_forces_kill() {
        let process = launch(
            "trap '' TERM; echo APP-READY; while true; do sleep 0.1; done",
            options(10_000, 300),
        )
        .await;
        process.await_readiness(LONG).await.unwrap();

        process.stop(Duration::from_millis(300)).await.unwrap();
        assert!(process.forced_kill_issued());
        assert!(!process.is_alive());
        assert_eq!(process.state(), Stopped);
    }

    #[tokio::test]
    async fn exit_within_grace_period_is_not_forced() {
        let process = launch(
            "trap 'sleep 0.5; exit 0' TERM; echo APP-READY; while true; do sleep 0.1; done",
            options(10_000, 10_000),
        )
        .await;
        process.await_readiness(LONG).await.unwrap();

        let started = Instant::now();
        process.stop(Duration::from_secs(10)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!process.forced_kill_issued());
        assert_eq!(process.state(), Stopped);
    }

    #[tokio::test]
    async fn concurrent_and_repeated_stops_are_harmless() {
        let process = launch("echo APP-READY; exec sleep 30", options(10_000, 5_000)).await;
        process.await_readiness(LONG).await.unwrap();

        let (first, second) = tokio::join!(
            process.stop(Duration::from_secs(5)),
            process.stop(Duration::from_secs(5))
        );
        first.unwrap();
        second.unwrap();
        process.stop(Duration::from_secs(5)).await.unwrap();

        assert_eq!(process.state(), Stopped);
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn wait_for_reports_how_the_process_ended() {
        let clean = launch("echo APP-READY; sleep 0.2; exit 0", options(10_000, 1_000)).await;
        clean.await_readiness(LONG).await.unwrap();
        let state = clean.wait_for(&CancellationToken::new()).await.unwrap();
        assert_eq!(state, Stopped);

        let crashed = launch("echo APP-READY; sleep 0.2; exit 4", options(10_000, 1_000)).await;
        crashed.await_readiness(LONG).await.unwrap();
        let state = crashed.wait_for(&CancellationToken::new()).await.unwrap();
        assert_eq!(state, Failed);
        assert!(matches!(
            crashed.get_error(),
            Some(ProcessFailure::Exited { .. })
        ));
    }

    #[tokio::test]
    async fn interrupted_wait_stops_the_process() {
        let process = launch("echo APP-READY; exec sleep 30", options(10_000, 5_000)).await;
        process.await_readiness(LONG).await.unwrap();

        let interrupt = CancellationToken::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = process.wait_for(&interrupt).await.unwrap_err();
        assert!(matches!(err, LauncherError::InterruptedWait));
        assert!(!process.is_alive());
        assert_eq!(process.state(), Stopped);
    }

    #[tokio::test]
    async fn stop_during_readiness_interrupts_the_wait() {
        let process = launch("exec sleep 30", options(10_000, 5_000)).await;
        let waiter = {
            let process = process.clone();
            tokio::spawn(async move { process.await_readiness(LONG).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        process.stop(Duration::from_secs(5)).await.unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(LauncherError::InterruptedWait)));
        assert_eq!(process.state(), Stopped);
    }

    #[tokio::test]
    async fn shutdown_hook_stops_the_process() {
        let process = launch("echo APP-READY; exec sleep 30", options(10_000, 5_000)).await;
        process.await_readiness(LONG).await.unwrap();

        let shutdown = CancellationToken::new();
        let hook = process.install_shutdown_hook(shutdown.clone());
        shutdown.cancel();
        hook.await.unwrap();

        assert!(!process.is_alive());
        assert_eq!(process.state(), Stopped);
    }

    #[tokio::test]
    async fn stdout_can_be_redirected_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("app.out");
        let config = LaunchConfiguration {
            stdout_file: Some(log.clone()),
            ..shell("echo hello; echo APP-READY; exec sleep 30")
        };

        let process = ProcessSupervisor::new(options(10_000, 5_000))
            .launch(&config)
            .await
            .unwrap();
        process.await_readiness(LONG).await.unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("hello\n"));
        process.stop(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn overlong_lines_are_forwarded_in_bounded_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.out");
        let config = LaunchConfiguration {
            stdout_file: Some(log.clone()),
            ..shell("head -c 200000 /dev/zero | tr '\\0' x; echo; echo APP-READY; exec sleep 30")
        };

        let process = ProcessSupervisor::new(options(10_000, 5_000))
            .launch(&config)
            .await
            .unwrap();
        process.await_readiness(LONG).await.unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        let pieces: Vec<&str> = contents.lines().filter(|l| l.starts_with('x')).collect();
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.len() <= 64 * 1024));
        assert_eq!(pieces.iter().map(|p| p.len()).sum::<usize>(), 200_000);
        process.stop(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let supervisor = ProcessSupervisor::new(options(1_000, 1_000));
        assert_eq!(supervisor.state(), Idle);

        let config = LaunchConfiguration {
            java: PathBuf::from("/nonexistent/bin/java"),
            ..LaunchConfiguration::default()
        };
        let err = supervisor.launch(&config).await.unwrap_err();
        assert!(matches!(err, LauncherError::Spawn { .. }));
    }

    #[tokio::test]
    async fn missing_executable_archive_is_a_spawn_error() {
        let config = LaunchConfiguration {
            java: PathBuf::from("/bin/sh"),
            executable_archive: Some(PathBuf::from("/nonexistent/app-launchpad.jar")),
            ..LaunchConfiguration::default()
        };
        let err = ProcessSupervisor::new(options(1_000, 1_000))
            .launch(&config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Spawn { ref program, .. } if program.ends_with("app-launchpad.jar")
        ));
    }
}
