//! Process liveness check.

/// Whether a process with `pid` exists on this host.
///
/// Sends signal 0, which performs the permission and existence checks without
/// delivering anything to the target. `EPERM` means the process exists but
/// belongs to another user. pid 0 (the caller's process group) is never
/// treated as a live holder.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Liveness cannot be checked without signals; assume the holder lives so
/// only an operator clears its lock.
#[cfg(not(unix))]
pub fn is_process_alive(pid: u32) -> bool {
    pid != 0
}
