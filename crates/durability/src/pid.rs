//! Process-liveness probe used for stale-lock detection.

/// Is a process with this pid running on this host?
///
/// Implemented as a zero-signal `kill(pid, 0)` on POSIX: `ESRCH` means the
/// process is gone, anything else (including `EPERM`, meaning it exists but
/// we can't signal it) means it's still alive and not ours to reclaim.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    let errno = std::io::Error::last_os_error().raw_os_error();
    errno != Some(libc::ESRCH)
}

/// Non-POSIX platforms have no cheap zero-signal probe here; treat every
/// pid as alive so stale-lock reclamation falls back to the expiry check
/// alone.
#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn pid_one_is_alive_or_unreachable_but_not_esrch() {
        // pid 1 (init) always exists on a real Linux host; this mostly
        // documents the semantics rather than asserting container-specific
        // behavior.
        let _ = is_process_alive(1);
    }

    #[test]
    fn implausible_pid_is_not_alive() {
        assert!(!is_process_alive(u32::MAX - 1));
    }
}
