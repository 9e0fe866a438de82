//! Error types and error handling strategy for Strand.
//!
//! Every public operation in the crate returns a [`Result`]. Errors are
//! explicit and typed: a copyable [`ErrorKind`] plus optional context text
//! and an optional source chain. Panics are reserved for contract
//! violations that indicate a bug in the caller (awaiting a fiber that
//! already has a consumer, awaiting outside a running fiber).

use core::fmt;
use std::io;
use std::rc::Rc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Graph sentinels ===
    /// A fiber completed without producing a value.
    BrokenPromise,
    /// The fiber's value was already taken by a previous `get`/await.
    AlreadyRetrieved,
    /// The reactor was asked to advance a graph with no pending I/O and no
    /// deadline anywhere. This indicates a bug in the driven future.
    NoIoPending,

    // === Timeouts / cancellation ===
    /// A deadline passed before the awaited condition held.
    TimedOut,
    /// The operation's subtree was torn down while still in flight.
    Cancelled,

    // === I/O ===
    /// File descriptor outside the range the readiness poll accepts.
    BadDescriptor,
    /// The non-blocking operation would block (`EAGAIN`, `EWOULDBLOCK`,
    /// `EINPROGRESS`).
    WouldBlock,
    /// Any other operating-system I/O failure.
    Io,

    // === Resources / arguments ===
    /// An allocation failed while growing a wait list.
    OutOfMemory,
    /// An argument was outside the representable domain.
    InvalidInput,
}

/// The main error type for Strand operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Rc<dyn std::error::Error>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error means "not ready yet, retry after the fd
    /// signals readiness".
    #[must_use]
    pub const fn is_would_block(&self) -> bool {
        matches!(self.kind, ErrorKind::WouldBlock)
    }

    /// Returns true if this error is a deadline expiry.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::TimedOut)
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Adds context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + 'static) -> Self {
        self.source = Some(Rc::new(source));
        self
    }

    /// Returns the raw OS error code, when the source is an OS error.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source
            .as_deref()
            .and_then(|s| s.downcast_ref::<io::Error>())
            .and_then(io::Error::raw_os_error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        let kind = match e.raw_os_error() {
            Some(code)
                if code == libc::EAGAIN || code == libc::EWOULDBLOCK || code == libc::EINPROGRESS =>
            {
                ErrorKind::WouldBlock
            }
            _ if e.kind() == io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
            _ => ErrorKind::Io,
        };
        Self::new(kind).with_source(e)
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context string on error.
    fn context(self, ctx: impl Into<String>) -> Result<T>;
    /// Attach context computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

/// A specialized Result type for Strand operations.
pub type Result<T> = core::result::Result<T, Error>;
