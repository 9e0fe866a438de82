//! Strand: a single-threaded cooperative await-graph runtime for
//! non-blocking I/O.
//!
//! # Overview
//!
//! Strand drives hand-composed futures ("fibers") on one thread, with no
//! task queue and no wakers doing real work. Every in-flight fiber owns a
//! node in an await graph: a back-reference to the fiber awaiting it and an
//! ordered list of children, where a child is either another fiber or a
//! pending I/O wait (an fd, a readiness interest, an optional deadline).
//!
//! Driving a root fiber to completion repeats one reactor step:
//!
//! 1. **Collect**: walk the graph from the root and gather every pending
//!    I/O leaf into `select(2)` fd sets plus the minimum deadline.
//! 2. **Block once** in `select`.
//! 3. **Mark** the leaves whose fd fired or whose deadline passed.
//! 4. **Dispatch**: resume the waiter of one ready leaf, then restart the
//!    walk from the root (a resumed fiber may have destroyed any other part
//!    of the graph). Repeat until no ready leaf remains.
//!
//! # Core Guarantees
//!
//! - **Structured cancellation**: dropping a [`Fiber`] tears down its whole
//!   subtree; pending leaves are unlinked and never wake.
//! - **Single consumer**: each fiber is awaited by at most one other fiber;
//!   violations are bugs and panic.
//! - **One blocking syscall per step**: all pending waits in the graph are
//!   aggregated into a single `select` call.
//! - **No allocation on the steady path**: a node's child list stores two
//!   entries inline; typical graphs (one awaited fiber or one pending I/O
//!   per node) never spill.
//!
//! # Module Structure
//!
//! - [`error`]: error type and result alias
//! - [`time`]: deadlines and timer futures
//! - [`runtime`]: fibers, the await graph, and the reactor
//! - [`io`]: readiness requests and non-blocking descriptor wrappers
//! - [`combinator`]: `wait`, `when_all*`, `when_any*`
//! - [`util`]: arena and small-list containers backing the graph
//!
//! Strand is Unix-only: the readiness primitive is `select(2)`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod combinator;
pub mod error;
pub mod io;
pub mod runtime;
pub mod time;
pub mod tracing_compat;
pub mod util;

mod sys;

pub use combinator::{
    wait, when_all, when_all2, when_all3, when_any, when_any2, Until, WhenAny,
};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use io::{resolve, Descriptor, Eagerness, Interest, Readiness, StreamSocket};
pub use runtime::{metrics, Fiber, RuntimeMetrics};
pub use time::{sleep, sleep_until, Deadline};
