//! Tests for the `work` module.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::work::{Discipline, ErrorLatch, Progress, WorkQueue};

#[test]
fn test_ordered_completions_follow_submission_order() {
    let mut wq = WorkQueue::new("test-ordered", Discipline::Ordered, 4).unwrap();
    let order: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    for i in 0..16 {
        let order = Arc::clone(&order);
        wq.queue(move || {
            // Later submissions finish their bodies first.
            std::thread::sleep(Duration::from_millis((16 - i) as u64));
            move || order.lock().push(i)
        });
    }
    wq.wait();

    let order = order.lock();
    assert_eq!(*order, (0..16).collect::<Vec<_>>());
}

#[test]
fn test_dynamic_queue_drains_every_task() {
    let mut wq = WorkQueue::new("test-dynamic", Discipline::Dynamic, 0).unwrap();
    let progress = Arc::new(Progress::new(64));

    for _ in 0..64 {
        let progress = Arc::clone(&progress);
        wq.queue(move || {
            move || {
                progress.tick();
            }
        });
    }
    wq.wait();
    assert_eq!(progress.done(), 64);
    assert_eq!(progress.total(), 64);
}

#[test]
fn test_latch_short_circuits_but_queue_drains() {
    let mut wq = WorkQueue::new("test-latch", Discipline::Dynamic, 2).unwrap();
    let latch = ErrorLatch::new();
    let executed = Arc::new(Progress::new(32));
    let completed = Arc::new(Progress::new(32));

    for i in 0..32 {
        let latch = latch.clone();
        let executed = Arc::clone(&executed);
        let completed = Arc::clone(&completed);
        wq.queue(move || {
            if !latch.is_set() {
                executed.tick();
                if i == 3 {
                    latch.set();
                }
            }
            move || {
                completed.tick();
            }
        });
    }
    wq.wait();

    assert!(latch.is_set());
    // Every task completed, but at least the tasks after the failure
    // observed the latch and skipped their work.
    assert_eq!(completed.done(), 32);
    assert!(executed.done() < 32);
}

#[test]
fn test_latch_is_single_shot_and_shared() {
    let latch = ErrorLatch::new();
    let clone = latch.clone();
    assert!(!latch.is_set());

    clone.set();
    assert!(latch.is_set());
    clone.set();
    assert!(latch.is_set());
}

#[test]
fn test_wait_on_empty_queue_returns() {
    let wq = WorkQueue::new("test-empty", Discipline::Ordered, 1).unwrap();
    wq.wait();
}
