//! Waiting for the first of a set of fibers.
//!
//! The `when_any*` combinators park until any input completes, then hand
//! back the winning index **and** the fibers themselves: losers that also
//! happened to finish can still be drained, and dropping them cancels the
//! rest.

use std::time::Instant;

use crate::combinator::wait::{wait_ids, Until};
use crate::error::Result;
use crate::runtime::Fiber;
use crate::time::Deadline;

/// Outcome of [`when_any`]: which input won, plus all the inputs back.
#[derive(Debug)]
pub struct WhenAny<T> {
    /// Index of the first input observed complete.
    pub index: usize,
    /// The input fibers, winner included, in input order.
    pub fibers: Vec<Fiber<T>>,
}

/// Waits for the first completion among `fibers`.
///
/// A deadline that fires before any completion yields `TimedOut`; the
/// inputs are dropped with the call frame, cancelling their subtrees.
pub async fn when_any<T>(
    fibers: Vec<Fiber<T>>,
    deadline: impl Into<Deadline>,
) -> Result<WhenAny<T>> {
    let deadline = deadline.into().resolve(Instant::now());
    let slots = fibers.iter().map(Fiber::pending_id).collect();
    let index = wait_ids(Until::FirstCompleted, slots, deadline).await?;
    Ok(WhenAny { index, fibers })
}

/// Two-fiber [`when_any`] with independently typed inputs.
///
/// Returns the winning index together with both fibers.
pub async fn when_any2<A, B>(
    a: Fiber<A>,
    b: Fiber<B>,
    deadline: impl Into<Deadline>,
) -> Result<(usize, (Fiber<A>, Fiber<B>))> {
    let deadline = deadline.into().resolve(Instant::now());
    let index = wait_ids(
        Until::FirstCompleted,
        vec![a.pending_id(), b.pending_id()],
        deadline,
    )
    .await?;
    Ok((index, (a, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::time::sleep;
    use std::time::Duration;

    #[test]
    fn already_done_single_input_wins_without_suspending() {
        let mut outer = Fiber::spawn(async {
            let done = Fiber::spawn(async { Ok(5) });
            assert!(done.done());
            let won = when_any(vec![done], Deadline::None).await?;
            assert_eq!(won.index, 0);
            let mut fibers = won.fibers;
            let mut winner = fibers.remove(0);
            winner.get()
        });
        assert_eq!(outer.get().expect("when_any"), 5);
    }

    #[test]
    fn faster_fiber_wins() {
        let mut outer = Fiber::spawn(async {
            let slow = Fiber::spawn(async {
                sleep(Duration::from_secs(30)).await?;
                Ok("slow")
            });
            let fast = Fiber::spawn(async {
                sleep(Duration::from_millis(10)).await?;
                Ok("fast")
            });
            let won = when_any(vec![slow, fast], Deadline::None).await?;
            assert_eq!(won.index, 1);
            Ok(won.index)
        });
        assert_eq!(outer.get().expect("when_any"), 1);
    }

    #[test]
    fn deadline_beats_slow_inputs_and_cancels_them() {
        let before = crate::runtime::metrics();
        let mut outer = Fiber::spawn(async {
            let slow = Fiber::spawn(async {
                sleep(Duration::from_secs(3600)).await?;
                Ok(0)
            });
            when_any(vec![slow], Duration::from_millis(10))
                .await
                .map(|won| won.index)
        });
        let err = outer.get().expect_err("deadline fires first");
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        let after = crate::runtime::metrics();
        assert_eq!(after.fibers, before.fibers);
        assert_eq!(after.leaves, before.leaves);
    }

    #[test]
    fn when_any2_returns_both_fibers() {
        let mut outer = Fiber::spawn(async {
            let nums = Fiber::spawn(async { Ok(3) });
            let words = Fiber::spawn(async {
                sleep(Duration::from_millis(50)).await?;
                Ok("later")
            });
            let (index, (mut nums, words)) =
                when_any2(nums, words, Deadline::None).await?;
            assert_eq!(index, 0);
            let value = nums.get()?;
            drop(words); // cancel the loser
            Ok(value)
        });
        assert_eq!(outer.get().expect("when_any2"), 3);
    }
}
