// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rstest::rstest;

use super::EventDispatcher;

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[rstest]
fn test_jobs_run_in_fifo_order() {
    let dispatcher = EventDispatcher::new();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    for index in 0..50usize {
        let delivered = Arc::clone(&delivered);
        dispatcher
            .dispatch(Box::new(move || delivered.lock().push(index)))
            .unwrap();
    }
    assert!(
        wait_until(Duration::from_secs(5), || delivered.lock().len() == 50),
        "all jobs should be delivered"
    );
    let delivered = delivered.lock();
    assert_eq!(*delivered, (0..50).collect::<Vec<_>>());
}

#[rstest]
fn test_producers_survive_a_full_queue() {
    let dispatcher = EventDispatcher::new();
    let delivered = Arc::new(Mutex::new(0usize));
    // far more jobs than the queue holds; the producer blocks rather
    // than failing while the worker drains
    for _ in 0..200usize {
        let delivered = Arc::clone(&delivered);
        dispatcher
            .dispatch(Box::new(move || {
                std::thread::sleep(Duration::from_millis(1));
                *delivered.lock() += 1;
            }))
            .unwrap();
    }
    assert!(
        wait_until(Duration::from_secs(10), || *delivered.lock() == 200),
        "all jobs should eventually be delivered"
    );
}

#[rstest]
fn test_drop_terminates_in_bounded_time_with_queued_work() {
    let dispatcher = EventDispatcher::new();
    let delivered = Arc::new(Mutex::new(0usize));
    for _ in 0..10usize {
        let delivered = Arc::clone(&delivered);
        dispatcher
            .dispatch(Box::new(move || {
                std::thread::sleep(Duration::from_millis(50));
                *delivered.lock() += 1;
            }))
            .unwrap();
    }
    let start = Instant::now();
    drop(dispatcher);
    // the worker finishes at most the job in flight and discards the
    // rest
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(*delivered.lock() < 10);
}

#[rstest]
fn test_try_dispatch_drops_on_overflow() {
    let dispatcher = EventDispatcher::new();
    let gate = Arc::new(Mutex::new(()));
    let blocker = gate.lock();
    {
        let gate = Arc::clone(&gate);
        dispatcher
            .dispatch(Box::new(move || {
                let _unblocked = gate.lock();
            }))
            .unwrap();
    }
    // with the worker parked, overfill the queue; try_dispatch must
    // never block
    for _ in 0..64usize {
        dispatcher.try_dispatch(Box::new(|| ())).unwrap();
    }
    drop(blocker);
}
