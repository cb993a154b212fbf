//! Raw descriptor flag helpers.
//!
//! These wrap `fcntl` directly so the same code can run inside a forked
//! child before `exec`, where only async-signal-safe calls are allowed.

use std::io;
use std::os::fd::RawFd;

/// Sets or clears `FD_CLOEXEC` so the descriptor survives `exec` when
/// `inheritable` is true.
pub(crate) fn set_inheritable(fd: RawFd, inheritable: bool) -> io::Result<()> {
    // SAFETY: F_GETFD only reads descriptor flags; an invalid fd yields EBADF.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let updated = if inheritable {
        flags & !libc::FD_CLOEXEC
    } else {
        flags | libc::FD_CLOEXEC
    };
    if updated == flags {
        return Ok(());
    }
    // SAFETY: F_SETFD only writes descriptor flags.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, updated) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Reports whether the descriptor survives `exec`.
#[cfg(test)]
pub(crate) fn is_inheritable(fd: RawFd) -> io::Result<bool> {
    // SAFETY: F_GETFD only reads descriptor flags.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::FD_CLOEXEC == 0)
}

/// Reports whether `O_NONBLOCK` is set on the open file description.
#[cfg(test)]
pub(crate) fn is_nonblocking(fd: RawFd) -> io::Result<bool> {
    // SAFETY: F_GETFL only reads status flags.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::O_NONBLOCK != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixDatagram;

    #[test]
    fn toggles_close_on_exec() {
        let (left, _right) = UnixDatagram::pair().expect("socket pair");
        let fd = left.as_raw_fd();
        assert!(!is_inheritable(fd).expect("flags"), "std sets CLOEXEC");
        set_inheritable(fd, true).expect("clear CLOEXEC");
        assert!(is_inheritable(fd).expect("flags"));
        set_inheritable(fd, false).expect("set CLOEXEC");
        assert!(!is_inheritable(fd).expect("flags"));
    }

    #[test]
    fn reports_nonblocking_state() {
        let (left, _right) = UnixDatagram::pair().expect("socket pair");
        assert!(!is_nonblocking(left.as_raw_fd()).expect("flags"));
        left.set_nonblocking(true).expect("set nonblocking");
        assert!(is_nonblocking(left.as_raw_fd()).expect("flags"));
    }

    #[test]
    fn rejects_closed_descriptor() {
        assert!(set_inheritable(-1, true).is_err());
    }
}
