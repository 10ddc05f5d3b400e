//! Signal numbers and their names

/// Signal names indexed by the platform's signal numbers.
static SIGNAL_NAMES: &[(libc::c_int, &str)] = &[
    (libc::SIGHUP, "SIGHUP"),
    (libc::SIGINT, "SIGINT"),
    (libc::SIGQUIT, "SIGQUIT"),
    (libc::SIGILL, "SIGILL"),
    (libc::SIGTRAP, "SIGTRAP"),
    (libc::SIGABRT, "SIGABRT"),
    (libc::SIGBUS, "SIGBUS"),
    (libc::SIGFPE, "SIGFPE"),
    (libc::SIGKILL, "SIGKILL"),
    (libc::SIGUSR1, "SIGUSR1"),
    (libc::SIGSEGV, "SIGSEGV"),
    (libc::SIGUSR2, "SIGUSR2"),
    (libc::SIGPIPE, "SIGPIPE"),
    (libc::SIGALRM, "SIGALRM"),
    (libc::SIGTERM, "SIGTERM"),
    (libc::SIGCHLD, "SIGCHLD"),
    (libc::SIGCONT, "SIGCONT"),
    (libc::SIGSTOP, "SIGSTOP"),
    (libc::SIGTSTP, "SIGTSTP"),
    (libc::SIGTTIN, "SIGTTIN"),
    (libc::SIGTTOU, "SIGTTOU"),
    (libc::SIGURG, "SIGURG"),
    (libc::SIGXCPU, "SIGXCPU"),
    (libc::SIGXFSZ, "SIGXFSZ"),
    (libc::SIGVTALRM, "SIGVTALRM"),
    (libc::SIGPROF, "SIGPROF"),
    (libc::SIGWINCH, "SIGWINCH"),
    (libc::SIGIO, "SIGIO"),
    (libc::SIGSYS, "SIGSYS"),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    (libc::SIGSTKFLT, "SIGSTKFLT"),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    (libc::SIGPWR, "SIGPWR"),
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    (libc::SIGEMT, "SIGEMT"),
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    (libc::SIGINFO, "SIGINFO"),
];

/// Name of signal `signal`, or `"Unknown"`.
pub fn signal_name(signal: i32) -> &'static str {
    SIGNAL_NAMES
        .iter()
        .find(|(number, _)| *number == signal)
        .map_or("Unknown", |(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_signals() {
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(libc::SIGINT), "SIGINT");
    }

    #[test]
    fn test_unknown_signal() {
        assert_eq!(signal_name(0), "Unknown");
        assert_eq!(signal_name(-1), "Unknown");
        assert_eq!(signal_name(1000), "Unknown");
    }

    #[test]
    fn test_numbers_are_unique() {
        for (i, (number, _)) in SIGNAL_NAMES.iter().enumerate() {
            assert!(SIGNAL_NAMES[i + 1..].iter().all(|(n, _)| n != number));
        }
    }
}
