//! Readiness waiting and asynchronous connect over raw sockets.
//!
//! The scheduler batches sockets by lifecycle state and asks which of them
//! are ready within a bounded wait; `poll(2)` is that primitive here.
//! Outbound sockets are created `O_NONBLOCK` before `connect(2)`, so the
//! connect returns immediately with `EINPROGRESS` and completion shows up
//! as write readiness.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{FromRawFd, RawFd};
use std::time::Duration;

/// Readiness direction a batch waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interest {
    Readable,
    Writable,
}

/// Wait up to `timeout` and return the fds that are ready for `interest`.
///
/// Error and hangup conditions count as ready so the subsequent I/O call
/// surfaces the real failure. `EINTR` and timeouts report no fds.
pub(crate) fn await_ready(
    fds: &[RawFd],
    interest: Interest,
    timeout: Duration,
) -> io::Result<Vec<RawFd>> {
    if fds.is_empty() {
        return Ok(Vec::new());
    }

    let events = match interest {
        Interest::Readable => libc::POLLIN,
        Interest::Writable => libc::POLLOUT,
    };
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events,
            revents: 0,
        })
        .collect();

    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Vec::new());
        }
        return Err(err);
    }

    let flagged = events | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;
    Ok(pollfds
        .iter()
        .filter(|p| p.revents & flagged != 0)
        .map(|p| p.fd)
        .collect())
}

/// Open a non-blocking TCP socket and start connecting to `addr`.
///
/// Returns as soon as the connect is in flight; write readiness signals
/// completion and `SO_ERROR` (via `TcpStream::take_error`) carries the
/// outcome.
pub(crate) fn connect_nonblocking(addr: SocketAddr) -> io::Result<TcpStream> {
    let family = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    let fd = unsafe { libc::socket(family, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let result = (|| {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }

        let rc = match addr {
            SocketAddr::V4(v4) => {
                let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                // Octets are already network order.
                sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
                unsafe {
                    libc::connect(
                        fd,
                        &sin as *const libc::sockaddr_in as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                    )
                }
            }
            SocketAddr::V6(v6) => {
                let mut sin6: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_addr.s6_addr = v6.ip().octets();
                sin6.sin6_scope_id = v6.scope_id();
                unsafe {
                    libc::connect(
                        fd,
                        &sin6 as *const libc::sockaddr_in6 as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                    )
                }
            }
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINPROGRESS) {
                return Err(err);
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => Ok(unsafe { TcpStream::from_raw_fd(fd) }),
        Err(e) => {
            unsafe { libc::close(fd) };
            Err(e)
        }
    }
}
