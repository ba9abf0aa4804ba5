//! Unit tests for the OS-probing port allocator.

use std::collections::HashSet;

use launchport::launcher::ports::PortAllocator;
use launchport::AppError;

#[test]
fn reserve_returns_a_nonzero_port() {
    let allocator = PortAllocator::default();
    let port = allocator.reserve(&HashSet::new()).expect("reserve");
    assert!(port > 0);
}

#[test]
fn reserve_skips_excluded_ports() {
    let allocator = PortAllocator::default();
    let first = allocator.reserve(&HashSet::new()).expect("first");

    let mut exclude = HashSet::new();
    exclude.insert(first);
    let second = allocator.reserve(&exclude).expect("second");

    assert_ne!(first, second);
}

/// A zero-attempt allocator deterministically exhausts without touching
/// the network stack.
#[test]
fn exhausted_attempts_is_no_port_available() {
    let allocator = PortAllocator::new(0);
    let err = allocator.reserve(&HashSet::new()).expect_err("must fail");
    assert!(matches!(err, AppError::NoPortAvailable(_)), "got {err}");
}

#[test]
fn sequential_reservations_with_growing_exclude_are_distinct() {
    let allocator = PortAllocator::default();
    let mut exclude = HashSet::new();
    for _ in 0..5 {
        let port = allocator.reserve(&exclude).expect("reserve");
        assert!(!exclude.contains(&port));
        exclude.insert(port);
    }
    assert_eq!(exclude.len(), 5);
}
