//! The owning fiber handle.
//!
//! A [`Fiber`] is created by [`Fiber::spawn`], which registers a node in
//! the await graph and immediately polls the future once: a fiber runs
//! synchronously from creation up to its first suspension. From there it
//! can be awaited from inside another fiber (linking it into the await
//! graph) or driven to completion from outside with [`Fiber::get`], the
//! synchronous drain that loops the reactor.
//!
//! Exactly one handle exists per frame; the handle is move-only and
//! dropping it before completion cancels the fiber's entire subtree.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::{Error, ErrorKind, Result};
use crate::runtime::context;
use crate::runtime::id::FiberId;
use crate::runtime::reactor;
use crate::runtime::state::{self, Edge, SharedState};
use crate::tracing_compat::trace;

/// Slot the frame writes its result into, shared with the handle.
type ValueCell<T> = Rc<RefCell<Option<Result<T>>>>;

/// A move-only owning handle to a running or finished fiber.
///
/// Awaiting a `Fiber` from inside another fiber links it into the await
/// graph (at most one awaiter; a second is a bug and panics). [`get`]
/// drives the reactor until the fiber finishes. Once the value has been
/// taken, both report [`ErrorKind::AlreadyRetrieved`].
///
/// [`get`]: Fiber::get
#[derive(Debug)]
pub struct Fiber<T> {
    id: Option<FiberId>,
    value: ValueCell<T>,
    state: SharedState,
    linked: bool,
}

impl<T: 'static> Fiber<T> {
    /// Spawns `future` as a fiber and runs it to its first suspension.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        let state = context::state();
        let value: ValueCell<T> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&value);
        let frame = async move {
            let out = future.await;
            *slot.borrow_mut() = Some(out);
        };
        let id = state.borrow_mut().insert_fiber(Box::pin(frame));
        trace!(fiber = %id, "spawn");
        reactor::resume(&state, id);
        Self {
            id: Some(id),
            value,
            state,
            linked: false,
        }
    }
}

impl<T> Fiber<T> {
    /// Returns true once the fiber has run to completion.
    #[must_use]
    pub fn done(&self) -> bool {
        self.id.map_or(true, |id| self.state.borrow().is_done(id))
    }

    /// Drives the reactor until this fiber completes, then returns its
    /// value.
    ///
    /// A second call returns [`ErrorKind::AlreadyRetrieved`]. A reactor
    /// failure (a `select` error, or a graph with nothing to wait on) is
    /// returned without consuming the fiber.
    pub fn get(&mut self) -> Result<T> {
        let Some(id) = self.id else {
            return Err(Error::new(ErrorKind::AlreadyRetrieved));
        };
        while !self.state.borrow().is_done(id) {
            reactor::turn(&self.state, id)?;
        }
        self.consume(id)
    }

    /// Takes the finished fiber's value and tears down its node.
    fn consume(&mut self, id: FiberId) -> Result<T> {
        {
            let mut st = self.state.borrow_mut();
            let caller = st.fiber(id).and_then(|node| node.caller);
            if let Some(parent) = caller {
                if let Some(parent_node) = st.fiber_mut(parent) {
                    parent_node.children.remove_item(&Edge::Fiber(id));
                }
            }
            st.fibers.remove(id.arena_index());
        }
        self.id = None;
        self.linked = false;
        self.value
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Err(Error::new(ErrorKind::BrokenPromise)))
    }

    /// The node id if this fiber still has a pending frame, `None` when it
    /// is done or consumed. `None` slots represent already-ready inputs in
    /// wait lists.
    pub(crate) fn pending_id(&self) -> Option<FiberId> {
        match self.id {
            Some(id) if !self.state.borrow().is_done(id) => Some(id),
            _ => None,
        }
    }
}

impl<T> Future for Fiber<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(id) = this.id else {
            return Poll::Ready(Err(Error::new(ErrorKind::AlreadyRetrieved)));
        };
        if this.state.borrow().is_done(id) {
            return Poll::Ready(this.consume(id));
        }
        let me = context::current_fiber().expect("fiber awaited outside a running fiber");
        let state = Rc::clone(&this.state);
        let mut st = state.borrow_mut();
        if !this.linked {
            if let Err(e) = st.link_child(me, id) {
                return Poll::Ready(Err(e));
            }
            this.linked = true;
        }
        if let Some(node) = st.fiber_mut(id) {
            node.final_waiter = Some(me);
        }
        Poll::Pending
    }
}

impl<T> Drop for Fiber<T> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            trace!(fiber = %id, "cancel");
            state::remove_fiber(&self.state, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime;
    use std::cell::Cell;

    #[test]
    fn immediate_fiber_completes_at_spawn() {
        let mut fiber = Fiber::spawn(async { Ok(42) });
        assert!(fiber.done());
        assert_eq!(fiber.get().expect("value"), 42);
    }

    #[test]
    fn spawn_runs_eagerly_to_first_suspension() {
        let hit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&hit);
        let fiber = Fiber::spawn(async move {
            flag.set(true);
            Ok(())
        });
        assert!(hit.get(), "body must run before spawn returns");
        drop(fiber);
    }

    #[test]
    fn second_get_reports_already_retrieved() {
        let mut fiber = Fiber::spawn(async { Ok("once") });
        assert_eq!(fiber.get().expect("value"), "once");
        let err = fiber.get().expect_err("second get must fail");
        assert_eq!(err.kind(), ErrorKind::AlreadyRetrieved);
    }

    #[test]
    fn awaiting_a_done_child_resolves_without_suspending() {
        let mut parent = Fiber::spawn(async {
            let mut child = Fiber::spawn(async { Ok(7) });
            assert!(child.done());
            let v = (&mut child).await?;
            Ok(v + 1)
        });
        assert_eq!(parent.get().expect("value"), 8);
    }

    #[test]
    fn dropping_unfinished_fiber_leaks_nothing() {
        let before = runtime::metrics();
        let fiber = Fiber::spawn(async {
            crate::time::sleep(std::time::Duration::from_secs(3600)).await
        });
        assert!(!fiber.done());
        drop(fiber);
        let after = runtime::metrics();
        assert_eq!(after.fibers, before.fibers);
        assert_eq!(after.leaves, before.leaves);
    }
}
