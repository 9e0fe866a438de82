//! The await graph.
//!
//! Per-thread state for every in-flight fiber and pending I/O leaf. A
//! fiber's node records who awaits it (`caller`), what it awaits
//! (`children`), whom to resume when it finishes (`final_waiter`), and the
//! boxed future that is its coroutine frame. A leaf records one pending
//! poll request and the fiber to resume once the reactor settles it.
//!
//! # Invariants
//!
//! - A node with `caller == Some(c)` appears exactly once in `c.children`.
//! - A leaf in some node's child list is `Pending` and has a waiter; once
//!   the reactor dispatches it, it has neither.
//! - Fiber edges form a tree: linking asserts the child has no caller yet.
//!
//! Back-references are arena indices, never pointers; a reference to a node
//! that has been torn down is a failed lookup, not a dangling pointer.

use std::cell::RefCell;
use std::future::Future;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;

use crate::error::Result;
use crate::io::Interest;
use crate::runtime::id::{FiberId, LeafId};
use crate::util::{Arena, SmallList};

/// One entry in a node's child list: a fiber being awaited or a pending
/// I/O leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    /// A child fiber linked under its caller.
    Fiber(FiberId),
    /// A pending I/O wait owned by this node's own frame.
    Leaf(LeafId),
}

/// Ordered child list; two entries inline, heap spill beyond.
pub(crate) type EdgeList = SmallList<Edge>;

/// Result slot of a leaf: untouched until the reactor settles it.
#[derive(Debug)]
pub(crate) enum LeafState {
    /// The reactor has not settled this wait yet.
    Pending,
    /// Readiness, expiry, or an immediate error.
    Ready(Result<()>),
}

impl LeafState {
    pub(crate) const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A pending I/O wait: the poll request plus result slot and waiter.
#[derive(Debug)]
pub(crate) struct LeafNode {
    /// Polled descriptor; `None` makes this a pure timer.
    pub fd: Option<RawFd>,
    /// Readiness bits requested for `fd`.
    pub interest: Interest,
    /// Absolute expiry, if any.
    pub deadline: Option<Instant>,
    /// Result slot, settled exactly once by the reactor.
    pub state: LeafState,
    /// Fiber to resume when `state` is settled; also the node whose child
    /// list holds this leaf. Cleared at dispatch.
    pub waiter: Option<FiberId>,
}

/// Per-fiber graph node.
pub(crate) struct FiberNode {
    /// The coroutine frame. Taken while the fiber is being polled; `None`
    /// after completion.
    pub future: Option<Pin<Box<dyn Future<Output = ()>>>>,
    /// The node currently awaiting this one.
    pub caller: Option<FiberId>,
    /// Ordered child edges; insertion order is preserved.
    pub children: EdgeList,
    /// Fiber to resume when this one reaches completion.
    pub final_waiter: Option<FiberId>,
    /// True once the frame has run to completion.
    pub done: bool,
}

impl std::fmt::Debug for FiberNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiberNode")
            .field("caller", &self.caller)
            .field("children", &self.children)
            .field("final_waiter", &self.final_waiter)
            .field("done", &self.done)
            .field("running", &self.future.is_none())
            .finish()
    }
}

/// The whole await graph for one thread.
#[derive(Debug, Default)]
pub(crate) struct RuntimeState {
    pub fibers: Arena<FiberNode>,
    pub leaves: Arena<LeafNode>,
}

/// Shared handle to the per-thread graph.
pub(crate) type SharedState = Rc<RefCell<RuntimeState>>;

impl RuntimeState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new fiber node for `future`.
    pub(crate) fn insert_fiber(
        &mut self,
        future: Pin<Box<dyn Future<Output = ()>>>,
    ) -> FiberId {
        FiberId::from_arena(self.fibers.insert(FiberNode {
            future: Some(future),
            caller: None,
            children: EdgeList::new(),
            final_waiter: None,
            done: false,
        }))
    }

    pub(crate) fn fiber(&self, id: FiberId) -> Option<&FiberNode> {
        self.fibers.get(id.arena_index())
    }

    pub(crate) fn fiber_mut(&mut self, id: FiberId) -> Option<&mut FiberNode> {
        self.fibers.get_mut(id.arena_index())
    }

    pub(crate) fn leaf(&self, id: LeafId) -> Option<&LeafNode> {
        self.leaves.get(id.arena_index())
    }

    pub(crate) fn leaf_mut(&mut self, id: LeafId) -> Option<&mut LeafNode> {
        self.leaves.get_mut(id.arena_index())
    }

    /// Returns true once the fiber has completed (or is already gone).
    pub(crate) fn is_done(&self, id: FiberId) -> bool {
        self.fiber(id).map_or(true, |node| node.done)
    }

    /// Inserts a leaf record and links it into `owner`'s child list.
    ///
    /// On child-list growth failure the record is removed again and the
    /// error returned; nothing already linked is disturbed.
    pub(crate) fn link_leaf(&mut self, owner: FiberId, leaf: LeafNode) -> Result<LeafId> {
        let id = LeafId::from_arena(self.leaves.insert(leaf));
        let node = self
            .fiber_mut(owner)
            .expect("leaf owner is the running fiber and must be live");
        match node.children.try_push(Edge::Leaf(id)) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.leaves.remove(id.arena_index());
                Err(e)
            }
        }
    }

    /// Removes a leaf record and its edge in the owner's child list.
    pub(crate) fn unlink_leaf(&mut self, id: LeafId) {
        if let Some(leaf) = self.leaves.remove(id.arena_index()) {
            if let Some(owner) = leaf.waiter {
                if let Some(node) = self.fiber_mut(owner) {
                    node.children.remove_item(&Edge::Leaf(id));
                }
            }
        }
    }

    /// Links `child` under `parent` and installs the back-reference.
    ///
    /// # Panics
    ///
    /// Panics if `child` already has a caller: a fiber has at most one
    /// consumer, and a second one is a bug in the composition.
    pub(crate) fn link_child(&mut self, parent: FiberId, child: FiberId) -> Result<()> {
        let prior = self.fiber(child).and_then(|node| node.caller);
        assert!(
            prior.is_none(),
            "fiber {child} is already awaited by {prior:?}; a fiber has a single consumer"
        );
        self.fiber_mut(parent)
            .expect("link parent must be live")
            .children
            .try_push(Edge::Fiber(child))?;
        let node = self.fiber_mut(child).expect("link child must be live");
        node.caller = Some(parent);
        Ok(())
    }

    /// Detaches `child` from `parent`: removes the edge and clears the
    /// back-reference and any pending resume.
    pub(crate) fn unlink_child(&mut self, parent: FiberId, child: FiberId) {
        if let Some(node) = self.fiber_mut(parent) {
            node.children.remove_item(&Edge::Fiber(child));
        }
        if let Some(node) = self.fiber_mut(child) {
            if node.caller == Some(parent) {
                node.caller = None;
                node.final_waiter = None;
            }
        }
    }
}

/// Tears down a fiber node and everything its frame owns.
///
/// The node is unlinked from its caller's child list, surviving child
/// fibers get their back-references cleared, and then the frame is dropped
/// *outside* the state borrow: handles and readiness futures inside it
/// re-enter the state to tear down their own subtrees and leaf records.
pub(crate) fn remove_fiber(state: &SharedState, id: FiberId) {
    let frame = {
        let mut st = state.borrow_mut();
        let Some(node) = st.fibers.remove(id.arena_index()) else {
            return;
        };
        if let Some(caller) = node.caller {
            if let Some(parent) = st.fiber_mut(caller) {
                parent.children.remove_item(&Edge::Fiber(id));
            }
        }
        for edge in &node.children {
            match *edge {
                Edge::Fiber(child) => {
                    if let Some(child_node) = st.fiber_mut(child) {
                        child_node.caller = None;
                        child_node.final_waiter = None;
                    }
                }
                // Leaf records are torn down by their readiness futures
                // when the frame drops below.
                Edge::Leaf(_) => {}
            }
        }
        node.future
    };
    drop(frame);
}
