//! Per-thread runtime context.
//!
//! The await graph lives in a thread-local slot, created lazily on first
//! use; fibers on one thread share one graph and never observe another
//! thread's. Alongside it, the identity of the fiber currently being polled
//! is tracked with save/restore discipline so nested resumes (a fiber
//! spawning and eagerly running a child) unwind correctly.
//!
//! `current_fiber` is deliberately crate-private: it is the capability that
//! lets readiness futures and combinators link things into the running
//! fiber's node, and nothing outside the crate gets to forge it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::runtime::id::FiberId;
use crate::runtime::state::{RuntimeState, SharedState};

thread_local! {
    static STATE: RefCell<Option<SharedState>> = const { RefCell::new(None) };
    static CURRENT: Cell<Option<FiberId>> = const { Cell::new(None) };
}

/// Returns this thread's await graph, creating it on first use.
pub(crate) fn state() -> SharedState {
    STATE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(state) = slot.as_ref() {
            Rc::clone(state)
        } else {
            let state = Rc::new(RefCell::new(RuntimeState::new()));
            *slot = Some(Rc::clone(&state));
            state
        }
    })
}

/// The fiber currently being polled on this thread, if any.
pub(crate) fn current_fiber() -> Option<FiberId> {
    CURRENT.with(Cell::get)
}

/// Marks `fiber` as the one being polled until the guard drops.
pub(crate) fn enter_fiber(fiber: FiberId) -> FiberGuard {
    FiberGuard {
        previous: CURRENT.with(|current| current.replace(Some(fiber))),
    }
}

/// Restores the previously running fiber on drop.
pub(crate) struct FiberGuard {
    previous: Option<FiberId>,
}

impl Drop for FiberGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ArenaIndex;

    fn fiber(n: u32) -> FiberId {
        FiberId::from_arena(ArenaIndex::new(n, 0))
    }

    #[test]
    fn state_is_shared_per_thread() {
        let a = state();
        let b = state();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn enter_fiber_nests_and_restores() {
        assert_eq!(current_fiber(), None);
        {
            let _outer = enter_fiber(fiber(1));
            assert_eq!(current_fiber(), Some(fiber(1)));
            {
                let _inner = enter_fiber(fiber(2));
                assert_eq!(current_fiber(), Some(fiber(2)));
            }
            assert_eq!(current_fiber(), Some(fiber(1)));
        }
        assert_eq!(current_fiber(), None);
    }
}
