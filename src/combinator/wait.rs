//! The wait primitive: park on a set of fibers until one or all complete.
//!
//! [`wait`] links every still-pending input under the calling fiber's own
//! node (the caller's child list *is* the wait set, no separate
//! allocation) and scans it each time the caller is resumed. An optional
//! deadline installs one extra pure-timer leaf alongside the children.
//!
//! On exit, completed or cancelled alike, every still-linked child is
//! detached and the caller's child list is exactly what it was on entry.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::error::{Error, ErrorKind, Result};
use crate::io::Interest;
use crate::runtime::context;
use crate::runtime::id::{FiberId, LeafId};
use crate::runtime::state::{LeafNode, LeafState, SharedState};
use crate::runtime::Fiber;
use crate::time::Deadline;

/// The completion condition of a [`wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// Wait until every input fiber has completed.
    AllCompleted,
    /// Wait until any one input fiber has completed.
    FirstCompleted,
}

/// Parks the current fiber on `fibers` until the condition holds.
///
/// Returns the index of the first completed input in `FirstCompleted`
/// mode, `0` once all inputs completed in `AllCompleted` mode, and `0`
/// immediately for an empty input. A deadline that fires first yields
/// [`ErrorKind::TimedOut`]. The inputs are only parked on, never consumed:
/// their values stay retrievable afterwards.
///
/// # Panics
///
/// Panics if an input fiber is already being awaited elsewhere.
pub async fn wait<T>(
    until: Until,
    fibers: &mut [Fiber<T>],
    deadline: impl Into<Deadline>,
) -> Result<usize> {
    let deadline = deadline.into().resolve(Instant::now());
    let slots: Vec<Option<FiberId>> = fibers.iter().map(Fiber::pending_id).collect();
    wait_ids(until, slots, deadline).await
}

/// Type-erased core shared by [`wait`] and the `when_*` combinators.
/// `None` slots stand for inputs that were already done on entry.
pub(crate) async fn wait_ids(
    until: Until,
    slots: Vec<Option<FiberId>>,
    deadline: Option<Instant>,
) -> Result<usize> {
    if slots.is_empty() {
        return Ok(0);
    }
    WaitFuture {
        until,
        slots,
        deadline,
        timer: None,
        owner: None,
        state: None,
        registered: false,
    }
    .await
}

/// The parked state of one `wait`.
///
/// Lives in the waiting fiber's own frame; registration happens on the
/// first poll, when the identity of that fiber is known. Drop detaches
/// whatever is still linked, which is what restores the caller's child
/// list on every exit path.
struct WaitFuture {
    until: Until,
    slots: Vec<Option<FiberId>>,
    deadline: Option<Instant>,
    timer: Option<LeafId>,
    owner: Option<FiberId>,
    state: Option<SharedState>,
    registered: bool,
}

impl Future for WaitFuture {
    type Output = Result<usize>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let state = context::state();
        let me = context::current_fiber().expect("wait used outside a running fiber");

        if !this.registered {
            this.owner = Some(me);
            this.state = Some(Rc::clone(&state));
            this.registered = true;
            let mut st = state.borrow_mut();
            for slot in &this.slots {
                if let Some(child) = *slot {
                    if let Err(e) = st.link_child(me, child) {
                        return Poll::Ready(Err(e));
                    }
                    if let Some(node) = st.fiber_mut(child) {
                        node.final_waiter = Some(me);
                    }
                }
            }
            if let Some(deadline) = this.deadline {
                let leaf = LeafNode {
                    fd: None,
                    interest: Interest::NONE,
                    deadline: Some(deadline),
                    state: LeafState::Pending,
                    waiter: Some(me),
                };
                match st.link_leaf(me, leaf) {
                    Ok(id) => this.timer = Some(id),
                    Err(e) => return Poll::Ready(Err(e)),
                }
            }
        }

        // Scan before looking at the timer: a completion that raced the
        // deadline onto the same wake-round wins.
        {
            let st = state.borrow();
            let mut all_ready = true;
            for (index, slot) in this.slots.iter().enumerate() {
                let ready = slot.map_or(true, |child| st.is_done(child));
                if ready {
                    if this.until == Until::FirstCompleted {
                        return Poll::Ready(Ok(index));
                    }
                } else {
                    all_ready = false;
                }
            }
            if all_ready {
                return Poll::Ready(Ok(0));
            }
        }

        if let Some(id) = this.timer {
            let mut st = state.borrow_mut();
            let fired = st.leaf(id).map_or(true, |leaf| !leaf.state.is_pending());
            if fired {
                this.timer = None;
                let settled = st.leaves.remove(id.arena_index()).map(|leaf| leaf.state);
                drop(st);
                let err = match settled {
                    Some(LeafState::Ready(Err(e))) => e,
                    _ => Error::new(ErrorKind::TimedOut),
                };
                return Poll::Ready(Err(err));
            }
        }

        Poll::Pending
    }
}

impl Drop for WaitFuture {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        let (Some(owner), Some(state)) = (self.owner, self.state.take()) else {
            return;
        };
        let mut st = state.borrow_mut();
        for slot in &self.slots {
            if let Some(child) = *slot {
                st.unlink_child(owner, child);
            }
        }
        if let Some(id) = self.timer.take() {
            st.unlink_leaf(id);
        }
    }
}
