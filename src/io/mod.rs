//! Readiness requests and non-blocking descriptor wrappers.
//!
//! [`Readiness`] is the primitive await: suspend the current fiber until a
//! descriptor is ready (or a deadline passes). [`Descriptor`] and
//! [`StreamSocket`] build the byte-level operations on top of it, each one
//! the same shape: try the syscall, and when it reports "would block",
//! await readiness and try again.

pub mod fd;
pub mod interest;
pub mod readiness;
pub mod socket;

pub use fd::{Descriptor, Eagerness};
pub use interest::Interest;
pub use readiness::Readiness;
pub use socket::{resolve, StreamSocket};
