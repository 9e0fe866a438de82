//! The awaitable poll request.
//!
//! A [`Readiness`] value describes one wait: an optional descriptor, the
//! readiness bits of interest, and an optional deadline. Awaiting it
//! suspends the current fiber until the reactor settles the wait: fd
//! ready, deadline passed, or an immediate error for a request `select`
//! can never satisfy.
//!
//! The first poll installs a leaf record in the await graph, linked into
//! the current fiber's child list. If the child list cannot grow, the
//! allocation error is returned right there and the fiber never suspends.
//! Dropping the future before the wait settles unlinks the leaf; no wake
//! fires for it.

use std::future::Future;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::error::{Error, ErrorKind, Result};
use crate::io::Interest;
use crate::runtime::context;
use crate::runtime::id::LeafId;
use crate::runtime::state::{LeafNode, LeafState, SharedState};
use crate::time::Deadline;

/// A single poll request: suspend until `fd` is ready or the deadline
/// passes.
#[derive(Debug)]
pub struct Readiness {
    fd: Option<RawFd>,
    interest: Interest,
    deadline: Option<Instant>,
    leaf: Option<LeafId>,
    state: Option<SharedState>,
}

impl Readiness {
    /// Waits for `fd` to become ready for `interest`, with no deadline.
    #[must_use]
    pub fn new(fd: RawFd, interest: Interest) -> Self {
        Self {
            fd: Some(fd),
            interest,
            deadline: None,
            leaf: None,
            state: None,
        }
    }

    /// Waits for `fd` with a deadline; a relative deadline is resolved
    /// against the clock now.
    #[must_use]
    pub fn with_deadline(fd: RawFd, interest: Interest, deadline: impl Into<Deadline>) -> Self {
        Self {
            fd: Some(fd),
            interest,
            deadline: deadline.into().resolve(Instant::now()),
            leaf: None,
            state: None,
        }
    }

    /// A pure timer: no descriptor, completes with `TimedOut` when the
    /// deadline passes.
    #[must_use]
    pub fn timer(deadline: impl Into<Deadline>) -> Self {
        Self {
            fd: None,
            interest: Interest::NONE,
            deadline: deadline.into().resolve(Instant::now()),
            leaf: None,
            state: None,
        }
    }
}

impl Future for Readiness {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let state = context::state();

        if let Some(id) = this.leaf {
            // Suspended before; see whether the reactor settled the wait.
            let mut st = state.borrow_mut();
            let settled = st.leaf(id).map_or(true, |leaf| !leaf.state.is_pending());
            if !settled {
                return Poll::Pending;
            }
            this.leaf = None;
            let Some(leaf) = st.leaves.remove(id.arena_index()) else {
                return Poll::Ready(Err(Error::new(ErrorKind::Cancelled)
                    .with_context("wait record vanished while suspended")));
            };
            return match leaf.state {
                LeafState::Ready(result) => Poll::Ready(result),
                LeafState::Pending => unreachable!("checked settled above"),
            };
        }

        let me = context::current_fiber()
            .expect("readiness awaited outside a running fiber");
        let leaf = LeafNode {
            fd: this.fd,
            interest: this.interest,
            deadline: this.deadline,
            state: LeafState::Pending,
            waiter: Some(me),
        };
        let linked = state.borrow_mut().link_leaf(me, leaf);
        match linked {
            Ok(id) => {
                this.leaf = Some(id);
                this.state = Some(state);
                Poll::Pending
            }
            // Could not grow the wait list; fail the await without ever
            // suspending.
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Drop for Readiness {
    fn drop(&mut self) {
        if let (Some(id), Some(state)) = (self.leaf.take(), self.state.take()) {
            state.borrow_mut().unlink_leaf(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{metrics, Fiber};
    use std::time::Duration;

    #[test]
    fn timer_completes_with_timed_out() {
        let mut fiber =
            Fiber::spawn(async { Readiness::timer(Duration::from_millis(5)).await });
        let err = fiber.get().expect_err("pure timer expires");
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn dropped_readiness_unlinks_its_leaf() {
        let before = metrics();
        let fiber = Fiber::spawn(async {
            Readiness::timer(Duration::from_secs(3600)).await
        });
        assert_eq!(metrics().leaves, before.leaves + 1);
        drop(fiber);
        assert_eq!(metrics().leaves, before.leaves);
    }
}
