//! Tests for ID allocation.

use super::*;
use crate::error::DocketError;
use crate::locks::{AcquireOutcome, RepoLock, RetryPolicy};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::TempDir;

fn test_lock(dir: &Path) -> RepoLock {
    RepoLock::new(dir.join("locks").join("repo.lock"), Duration::from_secs(60))
}

fn test_allocator(dir: &Path) -> IdAllocator {
    IdAllocator::new(test_lock(dir), dir.join("counters.json"), BTreeMap::new())
}

fn patient() -> RetryPolicy {
    RetryPolicy {
        attempts: 500,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
    }
}

fn numeric_suffix(id: &str) -> u64 {
    id.rsplit('-').next().unwrap().parse().unwrap()
}

#[test]
fn test_first_allocation_starts_at_one() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    assert_eq!(allocator.peek("BRIK", "card").unwrap(), 0);
    assert_eq!(allocator.allocate("BRIK", "card").unwrap(), "BRIK-001");
    assert_eq!(allocator.allocate("BRIK", "card").unwrap(), "BRIK-002");
    assert_eq!(allocator.peek("BRIK", "card").unwrap(), 2);
}

#[test]
fn test_allocation_releases_lock() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    allocator.allocate("BRIK", "card").unwrap();

    assert!(!temp_dir.path().join("locks").join("repo.lock").exists());
}

#[test]
fn test_counter_table_layout() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());
    allocator.allocate("BRIK", "card").unwrap();
    allocator.allocate("BRIK", "idea").unwrap();
    allocator.allocate("BRIK", "idea").unwrap();

    let raw = std::fs::read_to_string(allocator.counters_path()).unwrap();
    let table: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(table["BRIK"]["card"], 1);
    assert_eq!(table["BRIK"]["idea"], 2);
}

#[test]
fn test_allocations_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    for _ in 0..3 {
        allocator.allocate("BRIK", "card").unwrap();
    }
    assert_eq!(allocator.allocate("BRIK", "idea").unwrap(), "BRIK-OPP-0001");
    assert_eq!(allocator.allocate("AGENT", "card").unwrap(), "AGENT-001");

    assert_eq!(allocator.peek("BRIK", "card").unwrap(), 3);
    assert_eq!(allocator.peek("BRIK", "idea").unwrap(), 1);
    assert_eq!(allocator.peek("AGENT", "card").unwrap(), 1);
    assert_eq!(allocator.peek("AGENT", "idea").unwrap(), 0);
}

#[test]
fn test_fresh_instance_continues_sequence() {
    let temp_dir = TempDir::new().unwrap();
    {
        let allocator = test_allocator(temp_dir.path());
        allocator.allocate("AGENT", "task").unwrap();
        allocator.allocate("AGENT", "task").unwrap();
    }

    let allocator = test_allocator(temp_dir.path());
    assert_eq!(allocator.allocate("AGENT", "task").unwrap(), "AGENT-TASK-0003");
}

#[test]
fn test_concurrent_allocations_are_unique_and_contiguous() {
    let temp_dir = TempDir::new().unwrap();
    let root = Arc::new(temp_dir.path().to_path_buf());
    test_allocator(&root).reset("BRIK", "card", 10).unwrap();
    let before = test_allocator(&root).peek("BRIK", "card").unwrap();

    const WORKERS: usize = 8;
    const PER_WORKER: usize = 5;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let root = Arc::clone(&root);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                // Each worker stands in for an independent process.
                let allocator = test_allocator(&root).with_retry(patient());
                barrier.wait();
                (0..PER_WORKER)
                    .map(|_| allocator.allocate("BRIK", "card").unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), WORKERS * PER_WORKER);

    let mut values: Vec<u64> = ids.iter().map(|id| numeric_suffix(id)).collect();
    values.sort_unstable();
    let expected: Vec<u64> = (before + 1..=before + (WORKERS * PER_WORKER) as u64).collect();
    assert_eq!(values, expected);
}

#[test]
fn test_allocate_fails_loudly_when_lock_held() {
    let temp_dir = TempDir::new().unwrap();
    let lock = test_lock(temp_dir.path());
    let AcquireOutcome::Granted { token } = lock.acquire("pete", "long edit").unwrap() else {
        panic!("expected to acquire");
    };

    let allocator = test_allocator(temp_dir.path());
    let err = allocator.allocate("BRIK", "card").unwrap_err();
    assert!(matches!(err, DocketError::LockHeld(_)));
    assert_eq!(allocator.peek("BRIK", "card").unwrap(), 0);

    lock.release(&token);
    assert_eq!(allocator.allocate("BRIK", "card").unwrap(), "BRIK-001");
}

#[test]
fn test_corrupt_table_is_treated_as_empty() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());
    std::fs::write(allocator.counters_path(), "{ not json").unwrap();

    assert_eq!(allocator.peek("BRIK", "card").unwrap(), 0);
    assert_eq!(allocator.allocate("BRIK", "card").unwrap(), "BRIK-001");
}

#[test]
fn test_reset_raises_but_never_lowers() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    allocator.reset("BRIK", "card", 41).unwrap();
    assert_eq!(allocator.allocate("BRIK", "card").unwrap(), "BRIK-042");

    let err = allocator.reset("BRIK", "card", 5).unwrap_err();
    assert!(err.to_string().contains("refusing to lower"));
    assert_eq!(allocator.peek("BRIK", "card").unwrap(), 42);
}

#[test]
fn test_invalid_keys_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    assert!(allocator.allocate("../x", "card").is_err());
    assert!(allocator.allocate("BRIK", "").is_err());
    assert!(allocator.peek("BRIK", "a b").is_err());
    assert!(!allocator.counters_path().exists());
}

#[test]
fn test_configured_format_is_applied() {
    let temp_dir = TempDir::new().unwrap();
    let mut formats = BTreeMap::new();
    formats.insert(
        "card".to_string(),
        crate::config::IdFormatConfig {
            infix: None,
            width: 5,
        },
    );
    let allocator = IdAllocator::new(
        test_lock(temp_dir.path()),
        temp_dir.path().join("counters.json"),
        formats,
    );

    assert_eq!(allocator.allocate("brik", "card").unwrap(), "BRIK-00001");
    assert_eq!(allocator.format_id("BRIK", "card", 77), "BRIK-00077");
}

#[test]
fn test_keys_differing_only_in_case_share_a_counter() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    assert_eq!(allocator.allocate("brik", "card").unwrap(), "BRIK-001");
    assert_eq!(allocator.allocate("BRIK", "Card").unwrap(), "BRIK-002");
    assert_eq!(allocator.peek("Brik", "CARD").unwrap(), 2);

    let table = super::allocator::load_table(allocator.counters_path()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table["BRIK"]["card"], 2);
}

#[test]
fn test_category_rendering_like_another_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let allocator = test_allocator(temp_dir.path());

    allocator.reset("BRIK", "idea", 999).unwrap();
    assert_eq!(allocator.allocate("BRIK", "idea").unwrap(), "BRIK-OPP-1000");

    let err = allocator.allocate("BRIK", "opp").unwrap_err();
    assert!(matches!(err, DocketError::UserError(_)));
    assert!(allocator.reset("BRIK", "opp", 5).is_err());
    assert_eq!(allocator.peek("BRIK", "opp").unwrap(), 0);
    assert_eq!(allocator.peek("BRIK", "idea").unwrap(), 1000);
}
