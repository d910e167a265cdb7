/// Ask a process to terminate gracefully.
///
/// Returns `false` when no signal could be delivered (no PID, PID out of
/// range, delivery failed) and on platforms without a graceful termination
/// channel; callers then go straight to a forced kill.
#[cfg(unix)]
pub(super) fn send_terminate_signal(pid: Option<u32>) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return false;
    };

    let Ok(pid_i32) = i32::try_from(pid) else {
        tracing::warn!(pid = pid, "PID exceeds i32::MAX, cannot send SIGTERM");
        return false;
    };

    kill(Pid::from_raw(pid_i32), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
pub(super) fn send_terminate_signal(_pid: Option<u32>) -> bool {
    false
}
