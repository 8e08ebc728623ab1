use super::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_new_fence_starts_at_zero() {
    let fence = Fence::new("Frame fence");
    assert_eq!(fence.completed_value(), 0);
    assert_eq!(fence.name(), "Frame fence");
}

#[test]
fn test_signal_is_monotonic() {
    let fence = Fence::new("f");
    fence.signal(5);
    fence.signal(3);
    assert_eq!(fence.completed_value(), 5);
    fence.signal(6);
    assert_eq!(fence.completed_value(), 6);
}

#[test]
fn test_wait_returns_for_reached_value() {
    let fence = Fence::new("f");
    fence.signal(2);
    fence.wait(1);
    fence.wait(2);
}

#[test]
fn test_wait_blocks_until_signaled_from_another_thread() {
    let fence = Arc::new(Fence::new("f"));
    let signaler = {
        let fence = fence.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            fence.signal(7);
        })
    };

    fence.wait(7);
    assert_eq!(fence.completed_value(), 7);
    signaler.join().unwrap();
}

#[test]
fn test_wait_timeout_fails_fast() {
    let fence = Fence::new("f");
    assert!(!fence.wait_timeout(1, None));
    assert!(!fence.wait_timeout(1, Some(Duration::from_millis(1))));
    fence.signal(1);
    assert!(fence.wait_timeout(1, None));
}
