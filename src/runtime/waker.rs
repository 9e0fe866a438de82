//! The no-op waker.
//!
//! Wake-ups in this runtime are graph-driven: every leaf records the fiber
//! to resume, and the reactor polls that fiber directly. The `Waker` handed
//! to `poll` therefore never carries the wake signal; suspension points are
//! exclusively the crate's own readiness and fiber futures, which ignore
//! it. Futures that rely on a real waker to make progress are outside this
//! runtime's contract.

use std::sync::Arc;
use std::task::{Wake, Waker};

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}

    fn wake_by_ref(self: &Arc<Self>) {}
}

/// Returns a waker whose wake is a no-op.
pub(crate) fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWaker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_is_inert() {
        let waker = noop_waker();
        waker.wake_by_ref();
        waker.clone().wake();
    }
}
