//! The reactor: one step of I/O multiplexing over the await graph.
//!
//! [`turn`] is a pure step from (root node, now) to "advanced by one
//! wake-round":
//!
//! 1. **Collect**: walk the graph below the root; every pending leaf
//!    either fails fast (descriptor outside the `select` domain with no
//!    deadline, or deadline already behind us) or contributes its fd bits
//!    to the aggregated sets and its deadline to the aggregate minimum.
//! 2. **Block once**: a single `select` call with the aggregated sets and
//!    the minimum deadline; no deadline anywhere means block indefinitely.
//! 3. **Mark**: on timeout expiry, settle every leaf whose deadline is
//!    behind the wakeup time; otherwise settle every leaf whose fd fired
//!    for one of its requested readiness bits.
//! 4. **Dispatch**: find one ready leaf (reverse child order, depth
//!    first), detach it, resume its waiter, and restart the walk from the
//!    root. A resumed fiber may have destroyed any other node, so no
//!    position in the graph is carried across a resume; the root is the
//!    one node known to outlive the step, because its handle is driving
//!    it.
//!
//! A graph with no leaf anywhere cannot advance: [`turn`] reports
//! `NoIoPending`, which means the driven future is waiting on nothing,
//! a bug in its composition.

use std::task::Context;
use std::time::Instant;

use crate::error::{Error, ErrorKind, Result};
use crate::runtime::context;
use crate::runtime::id::FiberId;
use crate::runtime::state::{Edge, LeafState, RuntimeState, SharedState};
use crate::runtime::waker::noop_waker;
use crate::sys::{self, FdSet};
use crate::tracing_compat::trace;

/// Aggregated `select` arguments for one collect pass. After the syscall
/// the same sets hold the fired descriptors.
struct PollSets {
    read: FdSet,
    write: FdSet,
    except: FdSet,
    nfds: i32,
    deadline: Option<Instant>,
}

impl PollSets {
    fn new() -> Self {
        Self {
            read: FdSet::new(),
            write: FdSet::new(),
            except: FdSet::new(),
            nfds: 0,
            deadline: None,
        }
    }
}

/// Advances the graph under `root` by one blocking round.
pub(crate) fn turn(state: &SharedState, root: FiberId) -> Result<()> {
    let now = Instant::now();
    let mut sets = PollSets::new();
    let contributed = collect(&mut state.borrow_mut(), root, &mut sets, now);
    if !contributed {
        return Err(Error::new(ErrorKind::NoIoPending));
    }

    if sets.nfds > 0 || sets.deadline.is_some() {
        let timeout = sets
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        trace!(nfds = sets.nfds, ?timeout, "select");
        let fired = sys::select(
            sets.nfds,
            &mut sets.read,
            &mut sets.write,
            &mut sets.except,
            timeout,
        )?;
        let expired = if fired == 0 { Some(Instant::now()) } else { None };
        mark(&mut state.borrow_mut(), root, &sets, expired);
    }

    loop {
        // Two statements on purpose: the graph borrow must end before the
        // waiter runs, because the waiter re-enters the graph.
        let waiter = pop_ready(&mut state.borrow_mut(), root);
        let Some(waiter) = waiter else { break };
        resume(state, waiter);
    }
    Ok(())
}

/// Polls `first` and cascades: when a fiber completes, its final waiter is
/// polled next, up the chain until one stays suspended.
pub(crate) fn resume(state: &SharedState, first: FiberId) {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    let mut fiber = first;
    loop {
        let Some(mut frame) = state
            .borrow_mut()
            .fiber_mut(fiber)
            .and_then(|node| node.future.take())
        else {
            return;
        };
        trace!(fiber = %fiber, "resume");
        let guard = context::enter_fiber(fiber);
        let completed = frame.as_mut().poll(&mut cx).is_ready();
        drop(guard);

        if completed {
            // Frame locals are already gone; free the box outside any
            // state borrow all the same.
            drop(frame);
            let next = {
                let mut st = state.borrow_mut();
                match st.fiber_mut(fiber) {
                    Some(node) => {
                        node.done = true;
                        node.final_waiter.take()
                    }
                    None => None,
                }
            };
            match next {
                Some(waiter) => fiber = waiter,
                None => return,
            }
        } else {
            let mut st = state.borrow_mut();
            match st.fiber_mut(fiber) {
                Some(node) => node.future = Some(frame),
                None => {
                    // The node vanished while suspendable state was out;
                    // dropping the frame re-enters the state for cleanup.
                    drop(st);
                    drop(frame);
                }
            }
            return;
        }
    }
}

/// Walks the graph gathering pending leaves. Returns true if any leaf was
/// seen (settled inline or aggregated); false propagates "nothing to wait
/// on" up to [`turn`].
fn collect(st: &mut RuntimeState, fiber: FiberId, sets: &mut PollSets, now: Instant) -> bool {
    let Some(node) = st.fiber(fiber) else {
        return false;
    };
    let edges = node.children.clone();
    let mut contributed = false;
    for edge in &edges {
        match *edge {
            Edge::Leaf(id) => {
                contributed = true;
                let Some(leaf) = st.leaf_mut(id) else { continue };
                if !leaf.state.is_pending() {
                    // Settled on an earlier round but never dispatched
                    // (its waiter was detached by a combinator); the
                    // dispatch phase of this turn picks it up.
                    continue;
                }
                // select() accepts descriptors in [0, FD_LIMIT) only; a
                // request outside that domain can still act as a timer.
                match (leaf.fd, leaf.deadline) {
                    (Some(fd), None) if fd < 0 || fd >= sys::FD_LIMIT => {
                        leaf.state = LeafState::Ready(Err(Error::new(ErrorKind::BadDescriptor)));
                        continue;
                    }
                    (None, None) => {
                        leaf.state = LeafState::Ready(Err(Error::new(ErrorKind::BadDescriptor)
                            .with_context("empty poll request: no fd and no deadline")));
                        continue;
                    }
                    _ => {}
                }
                if let Some(deadline) = leaf.deadline {
                    if deadline < now {
                        leaf.state = LeafState::Ready(Err(Error::new(ErrorKind::TimedOut)));
                        continue;
                    }
                    sets.deadline = Some(sets.deadline.map_or(deadline, |d| d.min(deadline)));
                }
                if let Some(fd) = leaf.fd {
                    if fd >= 0 && fd < sys::FD_LIMIT {
                        if leaf.interest.is_readable() {
                            sets.read.insert(fd);
                        }
                        if leaf.interest.is_writable() {
                            sets.write.insert(fd);
                        }
                        if leaf.interest.is_priority() {
                            sets.except.insert(fd);
                        }
                        sets.nfds = sets.nfds.max(fd + 1);
                    }
                }
            }
            Edge::Fiber(child) => {
                contributed |= collect(st, child, sets, now);
            }
        }
    }
    contributed
}

/// Settles leaves after the blocking call: expiry when `select` timed out,
/// readiness when an fd fired for a requested bit.
fn mark(st: &mut RuntimeState, fiber: FiberId, sets: &PollSets, expired: Option<Instant>) {
    let Some(node) = st.fiber(fiber) else { return };
    let edges = node.children.clone();
    for edge in &edges {
        match *edge {
            Edge::Leaf(id) => {
                let Some(leaf) = st.leaf_mut(id) else { continue };
                if !leaf.state.is_pending() {
                    continue;
                }
                if let Some(at) = expired {
                    if leaf.deadline.is_some_and(|d| d <= at) {
                        leaf.state = LeafState::Ready(Err(Error::new(ErrorKind::TimedOut)));
                    }
                    continue;
                }
                let Some(fd) = leaf.fd else { continue };
                if fd < 0 || fd >= sys::FD_LIMIT {
                    continue;
                }
                let fired = (leaf.interest.is_readable() && sets.read.contains(fd))
                    || (leaf.interest.is_writable() && sets.write.contains(fd))
                    || (leaf.interest.is_priority() && sets.except.contains(fd));
                if fired {
                    leaf.state = LeafState::Ready(Ok(()));
                }
            }
            Edge::Fiber(child) => mark(st, child, sets, expired),
        }
    }
}

/// Finds one settled leaf (reverse child order, depth first), detaches it,
/// and returns its waiter. The caller resumes the waiter and calls again:
/// the resumed fiber may have reshaped the graph arbitrarily, so every
/// round starts over from the root.
fn pop_ready(st: &mut RuntimeState, fiber: FiberId) -> Option<FiberId> {
    let edges = st.fiber(fiber)?.children.clone();
    for edge in edges.iter().rev() {
        match *edge {
            Edge::Fiber(child) => {
                if let Some(waiter) = pop_ready(st, child) {
                    return Some(waiter);
                }
            }
            Edge::Leaf(id) => {
                let settled = st.leaf(id).is_some_and(|leaf| !leaf.state.is_pending());
                if settled {
                    let waiter = st
                        .leaf_mut(id)
                        .and_then(|leaf| leaf.waiter.take())
                        .expect("settled leaf with no waiter");
                    if let Some(node) = st.fiber_mut(fiber) {
                        node.children.remove_item(&Edge::Leaf(id));
                    }
                    return Some(waiter);
                }
            }
        }
    }
    None
}
