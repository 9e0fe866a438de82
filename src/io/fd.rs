//! Owned file descriptors and their byte-level operations.
//!
//! Each operation comes in the shape the readiness model dictates:
//!
//! ```text
//! op(buf):
//!   if eager: try the syscall; anything but "would block" is the answer
//!   loop:
//!     await readiness
//!     try the syscall; "would block" loops, success advances the buffer
//! ```
//!
//! Eager mode saves a `select` round when the kernel buffer already has
//! what we need; lazy mode always polls first, which keeps a busy
//! request/response loop from starving its peers on the send side.

use std::os::fd::RawFd;

use crate::error::Result;
use crate::io::{Interest, Readiness};
use crate::sys;
use crate::tracing_compat::trace;

/// Whether an operation probes the syscall before polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eagerness {
    /// Try the syscall first; poll only on "would block".
    Eager,
    /// Always poll for readiness before the first syscall.
    Lazy,
}

/// An owned file descriptor in non-blocking mode.
///
/// The descriptor is closed on drop. All async operations suspend only in
/// `await` on a [`Readiness`]; no syscall here ever blocks.
#[derive(Debug)]
pub struct Descriptor {
    fd: RawFd,
}

impl Descriptor {
    /// Takes ownership of `fd`. The caller must ensure it is open and in
    /// non-blocking mode (or call [`set_nonblocking`] right after).
    ///
    /// [`set_nonblocking`]: Descriptor::set_nonblocking
    #[must_use]
    pub const fn from_raw(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Returns the raw descriptor without giving up ownership.
    #[must_use]
    pub const fn as_raw(&self) -> RawFd {
        self.fd
    }

    /// Releases ownership; the caller becomes responsible for closing.
    #[must_use]
    pub fn into_raw(self) -> RawFd {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }

    /// Toggles `O_NONBLOCK`.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        sys::set_nonblocking(self.fd, nonblocking)
    }

    /// Reads once, returning the byte count of the first successful read.
    pub async fn read_some(&self, buf: &mut [u8], eager: Eagerness) -> Result<usize> {
        if eager == Eagerness::Eager {
            match sys::read(self.fd, buf) {
                Err(e) if e.is_would_block() => {}
                other => return other,
            }
        }
        loop {
            Readiness::new(self.fd, Interest::readable()).await?;
            match sys::read(self.fd, buf) {
                Err(e) if e.is_would_block() => {}
                other => return other,
            }
        }
    }

    /// Writes once, returning the byte count of the first successful
    /// write.
    pub async fn write_some(&self, buf: &[u8], eager: Eagerness) -> Result<usize> {
        if eager == Eagerness::Eager {
            match sys::write(self.fd, buf) {
                Err(e) if e.is_would_block() => {}
                other => return other,
            }
        }
        loop {
            Readiness::new(self.fd, Interest::writable()).await?;
            match sys::write(self.fd, buf) {
                Err(e) if e.is_would_block() => {}
                other => return other,
            }
        }
    }

    /// Reads until `buf` is full, short-returning the filled count on end
    /// of file.
    pub async fn read(&self, buf: &mut [u8], eager: Eagerness) -> Result<usize> {
        let mut filled = 0;
        if eager == Eagerness::Eager {
            match sys::read(self.fd, buf) {
                Ok(n) => filled += n,
                Err(e) if e.is_would_block() => {}
                Err(e) => return Err(e),
            }
        }
        while filled < buf.len() {
            Readiness::new(self.fd, Interest::readable()).await?;
            match sys::read(self.fd, &mut buf[filled..]) {
                // HUP/EOF: hand back what we have.
                Ok(0) => {
                    trace!(fd = self.fd, filled, "read hit eof");
                    return Ok(filled);
                }
                Ok(n) => filled += n,
                Err(e) if e.is_would_block() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Writes all of `buf`.
    pub async fn write(&self, buf: &[u8], eager: Eagerness) -> Result<()> {
        let mut remaining = buf;
        if eager == Eagerness::Eager {
            match sys::write(self.fd, remaining) {
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.is_would_block() => {}
                Err(e) => return Err(e),
            }
        }
        while !remaining.is_empty() {
            Readiness::new(self.fd, Interest::writable()).await?;
            match sys::write(self.fd, remaining) {
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.is_would_block() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        // Close errors have nowhere useful to go from a destructor.
        let _ = sys::close(self.fd);
    }
}
