//! Combinator end-to-end scenarios over real descriptors and timers.
//!
//! - nested `when_all` over four independently-ready fds
//! - `when_any` with work finishing ahead of a long timer
//! - `when_any` deadline expiry cancelling slow work
//! - `wait(all, [f])` equivalence with a plain await
//! - loser fibers staying drainable after a race

mod common;

use common::*;
use std::time::{Duration, Instant};

use strand::{
    metrics, sleep, wait, when_all, when_all3, when_any, when_any2, Deadline, Descriptor,
    Eagerness, ErrorKind, Fiber, Until,
};

/// A fiber that reads exactly one byte, lazily, from `reader`.
fn one_byte_reader(reader: Descriptor) -> Fiber<u8> {
    Fiber::spawn(async move {
        let mut buf = [0u8; 1];
        reader.read(&mut buf, Eagerness::Lazy).await?;
        Ok(buf[0])
    })
}

#[test]
fn nested_when_all_collects_every_fd_in_one_round() {
    init_test_logging();
    let before = metrics();

    // Four socket pairs, each pre-loaded with one byte; the lazy readers
    // all park on readability before anything is collected.
    let mut pairs = Vec::new();
    for tag in [b'a', b'b', b'c', b'd'] {
        let (r, w) = socket_pair();
        let mut feeder = Fiber::spawn(async move {
            w.write(&[tag], Eagerness::Eager).await?;
            Ok(w)
        });
        feeder.get().expect("preload");
        pairs.push(r);
    }
    let d = pairs.pop().expect("d");
    let c = pairs.pop().expect("c");
    let b = pairs.pop().expect("b");
    let a = pairs.pop().expect("a");

    let mut root = Fiber::spawn(async move {
        let inner = Fiber::spawn(when_all(
            vec![one_byte_reader(c), one_byte_reader(d)],
            Deadline::None,
        ));
        let (ra, rb, rinner) = when_all3(
            one_byte_reader(a),
            one_byte_reader(b),
            inner,
            Deadline::None,
        )
        .await?;
        let inner_values: Vec<u8> = rinner?.into_iter().collect::<strand::Result<_>>()?;
        Ok((ra?, rb?, inner_values))
    });

    let (va, vb, inner) = root.get().expect("nested when_all");
    assert_eq!(va, b'a');
    assert_eq!(vb, b'b');
    assert_eq!(inner, vec![b'c', b'd']);

    let after = metrics();
    assert_eq!(after.fibers, before.fibers);
    assert_eq!(after.leaves, before.leaves);
}

#[test]
fn when_any_prefers_finished_work_over_a_long_timer() {
    init_test_logging();
    let started = Instant::now();
    let mut root = Fiber::spawn(async {
        let work = Fiber::spawn(async {
            sleep(Duration::from_millis(10)).await?;
            Ok("done")
        });
        let timer = Fiber::spawn(async {
            sleep(Duration::from_secs(30)).await?;
            Ok("timer")
        });
        let (index, (mut work, timer)) = when_any2(work, timer, Deadline::None).await?;
        assert_eq!(index, 0);
        // The timer is detached, not fired: dropping it cancels cleanly.
        drop(timer);
        work.get()
    });
    assert_eq!(root.get().expect("winner"), "done");
    assert!(started.elapsed() < Duration::from_secs(5), "timer never ran out");
}

#[test]
fn when_any_deadline_cancels_slow_work() {
    init_test_logging();
    let before = metrics();
    let started = Instant::now();

    let mut root = Fiber::spawn(async {
        let slow = Fiber::spawn(async {
            sleep(Duration::from_secs(1)).await?;
            Ok(1)
        });
        when_any(vec![slow], Duration::from_millis(45))
            .await
            .map(|won| won.index)
    });
    let err = root.get().expect_err("deadline fires first");
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(started.elapsed() < Duration::from_millis(900), "slow work was cancelled");

    let after = metrics();
    assert_eq!(after.fibers, before.fibers);
    assert_eq!(after.leaves, before.leaves);
}

#[test]
fn wait_all_on_one_fiber_matches_plain_await() {
    init_test_logging();
    let via_wait = {
        let mut root = Fiber::spawn(async {
            let mut only = [Fiber::spawn(async {
                sleep(Duration::from_millis(5)).await?;
                Ok(99)
            })];
            let index = wait(Until::AllCompleted, &mut only, Deadline::None).await?;
            assert_eq!(index, 0);
            let [mut fiber] = only;
            fiber.get()
        });
        root.get().expect("wait form")
    };
    let via_await = {
        let mut root = Fiber::spawn(async {
            let mut fiber = Fiber::spawn(async {
                sleep(Duration::from_millis(5)).await?;
                Ok(99)
            });
            (&mut fiber).await
        });
        root.get().expect("await form")
    };
    assert_eq!(via_wait, via_await);
}

#[test]
fn race_losers_stay_drainable() {
    init_test_logging();
    let mut root = Fiber::spawn(async {
        let quick = Fiber::spawn(async {
            sleep(Duration::from_millis(5)).await?;
            Ok(1)
        });
        let slower = Fiber::spawn(async {
            sleep(Duration::from_millis(25)).await?;
            Ok(2)
        });
        let won = when_any(vec![quick, slower], Deadline::None).await?;
        assert_eq!(won.index, 0);

        // The loser is detached but alive; draining it still works.
        let mut fibers = won.fibers;
        let mut slower = fibers.pop().expect("loser");
        let mut quick = fibers.pop().expect("winner");
        let first = quick.get()?;
        let second = (&mut slower).await?;
        Ok(first + second)
    });
    assert_eq!(root.get().expect("drain both"), 3);
}

#[test]
fn when_all_deadline_applies_to_the_whole_group() {
    init_test_logging();
    let mut root = Fiber::spawn(async {
        let fast = Fiber::spawn(async {
            sleep(Duration::from_millis(5)).await?;
            Ok(1)
        });
        let never = Fiber::spawn(async {
            sleep(Duration::from_secs(3600)).await?;
            Ok(2)
        });
        when_all(vec![fast, never], Duration::from_millis(40))
            .await
            .map(|results| results.len())
    });
    let err = root.get().expect_err("group deadline");
    assert_eq!(err.kind(), ErrorKind::TimedOut);
}
