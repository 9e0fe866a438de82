//! OS adapters: the `select` readiness primitive and non-blocking fd
//! syscalls.
//!
//! This is the crate's only module with unsafe code; everything above it
//! works with owned descriptors, byte slices, and [`Result`]s. All
//! wrappers normalize the "not ready" errno family (`EAGAIN`,
//! `EWOULDBLOCK`, `EINPROGRESS`) into [`ErrorKind::WouldBlock`] via the
//! `From<io::Error>` conversion.

#![allow(unsafe_code)]

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// Upper bound (exclusive) on descriptors `select` accepts.
pub(crate) const FD_LIMIT: RawFd = libc::FD_SETSIZE as RawFd;

fn last_error() -> Error {
    Error::from(io::Error::last_os_error())
}

fn cvt(ret: libc::c_int) -> Result<libc::c_int> {
    if ret < 0 {
        Err(last_error())
    } else {
        Ok(ret)
    }
}

fn cvt_size(ret: libc::ssize_t) -> Result<usize> {
    if ret < 0 {
        Err(last_error())
    } else {
        Ok(ret as usize)
    }
}

/// An fd bitset for `select`. Before the call it carries the watched
/// descriptors; after, the fired ones.
pub(crate) struct FdSet {
    raw: libc::fd_set,
}

impl FdSet {
    pub(crate) fn new() -> Self {
        let mut raw: libc::fd_set = unsafe { mem::zeroed() };
        unsafe { libc::FD_ZERO(&mut raw) };
        Self { raw }
    }

    /// Adds `fd` to the set. `fd` must be in `[0, FD_LIMIT)`.
    pub(crate) fn insert(&mut self, fd: RawFd) {
        assert!(
            (0..FD_LIMIT).contains(&fd),
            "fd {fd} outside the select domain"
        );
        unsafe { libc::FD_SET(fd, &mut self.raw) };
    }

    /// Returns true if `fd` is in the set.
    pub(crate) fn contains(&self, fd: RawFd) -> bool {
        if !(0..FD_LIMIT).contains(&fd) {
            return false;
        }
        unsafe { libc::FD_ISSET(fd, &self.raw) }
    }
}

/// Blocks in `select(2)` until a watched fd fires or `timeout` elapses.
///
/// Returns the number of ready descriptors; 0 means the timeout expired.
/// `timeout: None` blocks indefinitely.
pub(crate) fn select(
    nfds: RawFd,
    read: &mut FdSet,
    write: &mut FdSet,
    except: &mut FdSet,
    timeout: Option<Duration>,
) -> Result<usize> {
    let mut tv = timeout.map(|t| libc::timeval {
        tv_sec: libc::time_t::try_from(t.as_secs()).unwrap_or(libc::time_t::MAX),
        tv_usec: libc::suseconds_t::try_from(t.subsec_micros()).unwrap_or(999_999),
    });
    let tv_ptr = tv
        .as_mut()
        .map_or(std::ptr::null_mut(), |tv| std::ptr::from_mut(tv));
    let ready = cvt(unsafe {
        libc::select(
            nfds,
            &mut read.raw,
            &mut write.raw,
            &mut except.raw,
            tv_ptr,
        )
    })?;
    Ok(ready as usize)
}

/// Non-blocking `read(2)`.
pub(crate) fn read(fd: RawFd, buf: &mut [u8]) -> Result<usize> {
    cvt_size(unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) })
}

/// Non-blocking `write(2)`.
pub(crate) fn write(fd: RawFd, buf: &[u8]) -> Result<usize> {
    cvt_size(unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) })
}

/// Non-blocking vectored send via `sendmsg(2)`.
pub(crate) fn sendmsg(fd: RawFd, bufs: &[io::IoSlice<'_>]) -> Result<usize> {
    let mut iovs: Vec<libc::iovec> = bufs
        .iter()
        .map(|buf| libc::iovec {
            iov_base: buf.as_ptr().cast_mut().cast(),
            iov_len: buf.len(),
        })
        .collect();
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = iovs.as_mut_ptr();
    msg.msg_iovlen = iovs.len() as _;
    #[cfg(target_os = "linux")]
    let flags = libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL;
    #[cfg(not(target_os = "linux"))]
    let flags = libc::MSG_DONTWAIT;
    cvt_size(unsafe { libc::sendmsg(fd, &msg, flags) })
}

fn sockaddr_from(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *std::ptr::from_mut(&mut storage).cast::<libc::sockaddr_in>() };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.s_addr = u32::from(*v4.ip()).to_be();
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 =
                unsafe { &mut *std::ptr::from_mut(&mut storage).cast::<libc::sockaddr_in6>() };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_scope_id = v6.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

/// Non-blocking `connect(2)`. An in-progress connection surfaces as
/// `WouldBlock`.
pub(crate) fn connect(fd: RawFd, addr: &SocketAddr) -> Result<()> {
    let (storage, len) = sockaddr_from(addr);
    cvt(unsafe {
        libc::connect(
            fd,
            std::ptr::from_ref(&storage).cast::<libc::sockaddr>(),
            len,
        )
    })?;
    Ok(())
}

/// Creates a non-blocking stream socket.
pub(crate) fn socket_stream(domain: libc::c_int, protocol: libc::c_int) -> Result<RawFd> {
    // Some OSs open non-blocking sockets in a single syscall.
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    {
        cvt(unsafe { libc::socket(domain, libc::SOCK_STREAM | libc::SOCK_NONBLOCK, protocol) })
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )))]
    {
        let fd = cvt(unsafe { libc::socket(domain, libc::SOCK_STREAM, protocol) })?;
        set_nonblocking(fd, true)?;
        Ok(fd)
    }
}

/// Reads the file status flags.
pub(crate) fn fcntl_get_flags(fd: RawFd) -> Result<libc::c_int> {
    cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })
}

/// Replaces the file status flags.
pub(crate) fn fcntl_set_flags(fd: RawFd, flags: libc::c_int) -> Result<()> {
    cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, flags) })?;
    Ok(())
}

/// Toggles `O_NONBLOCK` on `fd`.
pub(crate) fn set_nonblocking(fd: RawFd, nonblocking: bool) -> Result<()> {
    let flags = fcntl_get_flags(fd)?;
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    fcntl_set_flags(fd, flags)
}

/// Reads and clears the socket's pending error (`SO_ERROR`).
pub(crate) fn socket_error(fd: RawFd) -> Result<Option<Error>> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    cvt(unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            std::ptr::from_mut(&mut value).cast(),
            &mut len,
        )
    })?;
    if value == 0 {
        Ok(None)
    } else {
        Ok(Some(Error::from(io::Error::from_raw_os_error(value))))
    }
}

fn set_opt_int(
    fd: RawFd,
    level: libc::c_int,
    option: libc::c_int,
    value: libc::c_int,
) -> Result<()> {
    cvt(unsafe {
        libc::setsockopt(
            fd,
            level,
            option,
            std::ptr::from_ref(&value).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    })?;
    Ok(())
}

/// Enables or disables `SO_KEEPALIVE`.
pub(crate) fn set_keepalive(fd: RawFd, enabled: bool) -> Result<()> {
    set_opt_int(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, libc::c_int::from(enabled))
}

/// Sets the idle time before keep-alive probes start.
pub(crate) fn set_keepalive_idle(fd: RawFd, idle: Duration) -> Result<()> {
    let secs = libc::c_int::try_from(idle.as_secs())
        .map_err(|_| Error::new(ErrorKind::InvalidInput).with_context("keep-alive idle seconds"))?;
    set_opt_int(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, secs)
}

/// Enables TCP fastopen-connect on a client socket (Linux only; elsewhere
/// reported as unsupported I/O).
pub(crate) fn set_fastopen_connect(fd: RawFd, enabled: bool) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        set_opt_int(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_FASTOPEN_CONNECT,
            libc::c_int::from(enabled),
        )
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (fd, enabled);
        Err(Error::from(io::Error::from_raw_os_error(libc::ENOPROTOOPT)))
    }
}

/// `shutdown(2)` for one or both directions.
pub(crate) fn shutdown(fd: RawFd, how: std::net::Shutdown) -> Result<()> {
    let how = match how {
        std::net::Shutdown::Read => libc::SHUT_RD,
        std::net::Shutdown::Write => libc::SHUT_WR,
        std::net::Shutdown::Both => libc::SHUT_RDWR,
    };
    cvt(unsafe { libc::shutdown(fd, how) })?;
    Ok(())
}

/// `close(2)`; the error, if any, is reported but the fd is gone either
/// way.
pub(crate) fn close(fd: RawFd) -> Result<()> {
    cvt(unsafe { libc::close(fd) })?;
    Ok(())
}
