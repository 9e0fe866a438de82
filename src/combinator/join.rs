//! Waiting for all of a set of fibers.
//!
//! The `when_all*` combinators take ownership of their inputs, park until
//! every one has completed (or the deadline fires), then gather the
//! individual results. A failed input does not fail the whole: the output
//! is one [`Result`] per input.

use std::time::Instant;

use crate::combinator::wait::{wait_ids, Until};
use crate::error::Result;
use crate::runtime::Fiber;
use crate::time::Deadline;

/// Waits for every fiber in `fibers`; yields one result per input, in
/// input order.
///
/// A deadline that fires first yields `TimedOut` and drops the inputs,
/// cancelling whatever was still running.
pub async fn when_all<T>(
    mut fibers: Vec<Fiber<T>>,
    deadline: impl Into<Deadline>,
) -> Result<Vec<Result<T>>> {
    let deadline = deadline.into().resolve(Instant::now());
    let slots = fibers.iter().map(Fiber::pending_id).collect();
    wait_ids(Until::AllCompleted, slots, deadline).await?;

    let mut results = Vec::with_capacity(fibers.len());
    for fiber in &mut fibers {
        results.push(fiber.await);
    }
    Ok(results)
}

/// Two-fiber [`when_all`] with independently typed results.
pub async fn when_all2<A, B>(
    mut a: Fiber<A>,
    mut b: Fiber<B>,
    deadline: impl Into<Deadline>,
) -> Result<(Result<A>, Result<B>)> {
    let deadline = deadline.into().resolve(Instant::now());
    wait_ids(
        Until::AllCompleted,
        vec![a.pending_id(), b.pending_id()],
        deadline,
    )
    .await?;
    let ra = (&mut a).await;
    let rb = (&mut b).await;
    Ok((ra, rb))
}

/// Three-fiber [`when_all`] with independently typed results.
pub async fn when_all3<A, B, C>(
    mut a: Fiber<A>,
    mut b: Fiber<B>,
    mut c: Fiber<C>,
    deadline: impl Into<Deadline>,
) -> Result<(Result<A>, Result<B>, Result<C>)> {
    let deadline = deadline.into().resolve(Instant::now());
    wait_ids(
        Until::AllCompleted,
        vec![a.pending_id(), b.pending_id(), c.pending_id()],
        deadline,
    )
    .await?;
    let ra = (&mut a).await;
    let rb = (&mut b).await;
    let rc = (&mut c).await;
    Ok((ra, rb, rc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::sleep;
    use std::time::Duration;

    #[test]
    fn when_all_gathers_in_input_order() {
        let mut outer = Fiber::spawn(async {
            let fibers = vec![
                Fiber::spawn(async {
                    sleep(Duration::from_millis(12)).await?;
                    Ok(1)
                }),
                Fiber::spawn(async { Ok(2) }),
                Fiber::spawn(async {
                    sleep(Duration::from_millis(4)).await?;
                    Ok(3)
                }),
            ];
            let results = when_all(fibers, Deadline::None).await?;
            let values: Vec<i32> = results.into_iter().collect::<Result<_>>()?;
            Ok(values)
        });
        assert_eq!(outer.get().expect("when_all"), vec![1, 2, 3]);
    }

    #[test]
    fn when_all2_mixes_types() {
        let mut outer = Fiber::spawn(async {
            let a = Fiber::spawn(async {
                sleep(Duration::from_millis(3)).await?;
                Ok(41)
            });
            let b = Fiber::spawn(async { Ok("ok") });
            let (ra, rb) = when_all2(a, b, Deadline::None).await?;
            Ok((ra?, rb?))
        });
        assert_eq!(outer.get().expect("when_all2"), (41, "ok"));
    }

    #[test]
    fn when_all_collects_failures_individually() {
        let mut outer = Fiber::spawn(async {
            let fibers = vec![
                Fiber::spawn(async { Ok(10) }),
                Fiber::spawn(async {
                    sleep(Duration::from_millis(2)).await?;
                    Err(crate::Error::new(crate::ErrorKind::Io).with_context("boom"))
                }),
            ];
            let results = when_all(fibers, Deadline::None).await?;
            assert!(results[0].is_ok());
            assert!(results[1].is_err());
            Ok(results.len())
        });
        assert_eq!(outer.get().expect("when_all"), 2);
    }
}
