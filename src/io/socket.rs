//! Non-blocking stream sockets.
//!
//! [`StreamSocket`] owns a stream-mode descriptor created non-blocking
//! from the first syscall (or via `fcntl` where the OS cannot do it in
//! one). Connecting follows the non-blocking protocol: issue `connect`,
//! wait for writability, then read the socket's pending error to learn the
//! real outcome.

use std::io::IoSlice;
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::ops::Deref;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::io::{Descriptor, Eagerness, Interest, Readiness};
use crate::sys;
use crate::tracing_compat::{debug, trace};

/// Resolves a host/port pair to socket addresses.
///
/// Wraps the system resolver; the returned records are owned, nothing to
/// release by hand.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::from(e).with_context(format!("resolving {host}:{port}")))?;
    Ok(addrs.collect())
}

/// An owned non-blocking stream socket.
#[derive(Debug)]
pub struct StreamSocket {
    fd: Descriptor,
}

impl StreamSocket {
    /// Creates a non-blocking stream socket for `domain` (e.g.
    /// `libc::AF_INET`) and `protocol` (0 for the default).
    pub fn create(domain: i32, protocol: i32) -> Result<Self> {
        let fd = sys::socket_stream(domain, protocol)?;
        trace!(fd, domain, "socket created");
        Ok(Self {
            fd: Descriptor::from_raw(fd),
        })
    }

    /// Connects to `addr`, suspending until the handshake settles.
    ///
    /// A non-blocking `connect` that cannot finish immediately parks on
    /// writability; the pending socket error then decides success.
    pub async fn connect(&self, addr: &SocketAddr) -> Result<()> {
        match sys::connect(self.fd.as_raw(), addr) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_would_block() => {}
            Err(e) => return Err(e),
        }

        Readiness::new(self.fd.as_raw(), Interest::writable()).await?;

        match sys::socket_error(self.fd.as_raw())? {
            None => Ok(()),
            Some(err) => Err(err.with_context(format!("connecting to {addr}"))),
        }
    }

    /// Creates a socket for `addr`'s family and connects it.
    pub async fn create_connection(addr: &SocketAddr) -> Result<Self> {
        let domain = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        let socket = Self::create(domain, 0)?;
        socket.connect(addr).await?;
        debug!(fd = socket.fd.as_raw(), %addr, "connected");
        Ok(socket)
    }

    /// Sends all of `bufs`, vectored.
    ///
    /// Whole buffers go out through `sendmsg`; when a partially-sent
    /// buffer sits at the front, it is drained with scalar writes before
    /// the vectored path resumes.
    pub async fn send(&self, bufs: &[IoSlice<'_>], eager: Eagerness) -> Result<()> {
        let fd = self.fd.as_raw();
        let mut bufs = bufs;
        let mut sent = 0usize;

        if eager == Eagerness::Eager {
            match sys::sendmsg(fd, bufs) {
                Ok(n) => sent = n,
                Err(e) if e.is_would_block() => {}
                Err(e) => return Err(e),
            }
        }

        while !bufs.is_empty() {
            // Skip buffers that went out whole.
            while sent >= bufs[0].len() {
                sent -= bufs[0].len();
                bufs = &bufs[1..];
                if bufs.is_empty() {
                    return Ok(());
                }
            }

            Readiness::new(fd, Interest::writable()).await?;

            if sent > 0 {
                // Drain the partial front scalar-wise; its tail cannot be
                // re-described to sendmsg without copying.
                match sys::write(fd, &bufs[0][sent..]) {
                    Ok(n) => sent += n,
                    Err(e) if e.is_would_block() => {}
                    Err(e) => return Err(e),
                }
                continue;
            }

            match sys::sendmsg(fd, bufs) {
                Ok(n) => sent += n,
                Err(e) if e.is_would_block() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Shuts down one or both directions.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        sys::shutdown(self.fd.as_raw(), how)
    }

    /// Reads and clears the pending socket error (`SO_ERROR`).
    pub fn take_error(&self) -> Result<Option<Error>> {
        sys::socket_error(self.fd.as_raw())
    }

    /// Enables or disables keep-alive probes.
    pub fn set_keepalive(&self, enabled: bool) -> Result<()> {
        sys::set_keepalive(self.fd.as_raw(), enabled)
    }

    /// Sets the idle time before the first keep-alive probe.
    pub fn set_keepalive_idle(&self, idle: Duration) -> Result<()> {
        if idle.is_zero() {
            return Err(Error::new(ErrorKind::InvalidInput)
                .with_context("keep-alive idle must be positive"));
        }
        sys::set_keepalive_idle(self.fd.as_raw(), idle)
    }

    /// Enables TCP fastopen on the connecting side.
    pub fn set_fastopen_connect(&self, enabled: bool) -> Result<()> {
        sys::set_fastopen_connect(self.fd.as_raw(), enabled)
    }

    /// Borrows the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        &self.fd
    }

    /// Hands the descriptor over, giving up socket-specific operations.
    #[must_use]
    pub fn into_descriptor(self) -> Descriptor {
        self.fd
    }
}

impl Deref for StreamSocket {
    type Target = Descriptor;

    fn deref(&self) -> &Descriptor {
        &self.fd
    }
}
