//! Fiber lifecycle tests: eager start, value retrieval, cancellation,
//! leak-freedom.

mod common;

use common::*;
use std::time::Duration;

use strand::{metrics, Eagerness, ErrorKind, Fiber, Interest, Readiness};

#[test]
fn get_twice_reports_already_retrieved() {
    init_test_logging();
    let mut fiber = Fiber::spawn(async {
        strand::sleep(Duration::from_millis(5)).await?;
        Ok("value")
    });
    assert_eq!(fiber.get().expect("first get"), "value");
    let err = fiber.get().expect_err("second get");
    assert_eq!(err.kind(), ErrorKind::AlreadyRetrieved);
}

#[test]
fn dropping_the_root_cancels_without_waking_and_keeps_the_fd_open() {
    init_test_logging();
    let (a, b) = socket_pair();
    let fd = a.as_raw();
    let before = metrics();

    let fiber = Fiber::spawn(async move {
        Readiness::new(fd, Interest::readable()).await?;
        Ok(true)
    });
    assert!(!fiber.done());
    assert_eq!(metrics().leaves, before.leaves + 1);

    drop(fiber);

    // Subtree gone, nothing resumed, nothing leaked.
    let after = metrics();
    assert_eq!(after.fibers, before.fibers);
    assert_eq!(after.leaves, before.leaves);

    // The descriptor stayed with its owner: data still flows through it.
    let mut writer = Fiber::spawn(async move {
        b.write(b"still alive", Eagerness::Eager).await?;
        Ok(b)
    });
    writer.get().expect("peer write");
    let mut reader = Fiber::spawn(async move {
        let mut buf = [0u8; 11];
        let n = a.read(&mut buf, Eagerness::Lazy).await?;
        Ok((n, buf))
    });
    let (n, buf) = reader.get().expect("owner read");
    assert_eq!(n, 11);
    assert_eq!(&buf, b"still alive");
}

#[test]
fn completed_graph_leaves_no_descendants_behind() {
    init_test_logging();
    let before = metrics();
    let mut root = Fiber::spawn(async {
        let inner = Fiber::spawn(async {
            strand::sleep(Duration::from_millis(3)).await?;
            Ok(2)
        });
        let outer = Fiber::spawn(async {
            strand::sleep(Duration::from_millis(6)).await?;
            Ok(3)
        });
        let (a, b) = strand::when_all2(inner, outer, strand::Deadline::None).await?;
        Ok(a? * b?)
    });
    assert_eq!(root.get().expect("nested graph"), 6);
    let after = metrics();
    assert_eq!(after.fibers, before.fibers);
    assert_eq!(after.leaves, before.leaves);
}

#[test]
fn child_failure_propagates_through_await() {
    init_test_logging();
    let mut root = Fiber::spawn(async {
        let mut child: Fiber<u8> = Fiber::spawn(async {
            strand::sleep(Duration::from_millis(2)).await?;
            Err(strand::Error::new(ErrorKind::Io).with_context("device gone"))
        });
        (&mut child).await
    });
    let err = root.get().expect_err("child error bubbles");
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.to_string(), "Io: device gone");
}

#[test]
fn many_sequential_fibers_recycle_graph_slots() {
    init_test_logging();
    let before = metrics();
    for round in 0..64 {
        let mut fiber = Fiber::spawn(async move {
            strand::sleep(Duration::from_micros(200)).await?;
            Ok(round)
        });
        assert_eq!(fiber.get().expect("round"), round);
    }
    let after = metrics();
    assert_eq!(after.fibers, before.fibers);
    assert_eq!(after.leaves, before.leaves);
}
