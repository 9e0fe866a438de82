#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::os::fd::IntoRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Once;

use strand::Descriptor;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// A connected non-blocking socket pair, ownership transferred into
/// [`Descriptor`]s.
pub fn socket_pair() -> (Descriptor, Descriptor) {
    let (a, b) = UnixStream::pair().expect("socketpair");
    a.set_nonblocking(true).expect("nonblocking a");
    b.set_nonblocking(true).expect("nonblocking b");
    (
        Descriptor::from_raw(a.into_raw_fd()),
        Descriptor::from_raw(b.into_raw_fd()),
    )
}
