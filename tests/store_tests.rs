//! Tests for Store
//!
//! These tests verify:
//! - Point operations (get/put/remove)
//! - Atomic batches (put_all/remove_all/explicit BatchWriter)
//! - Cursor iteration (search/load_all/remove_current)
//! - Flush and close lifecycle, including stale batches and cursors
//! - Error propagation from failing engines
//! - Concurrent access during flush

mod common;

use std::sync::Arc;
use std::thread;

use common::{FailingEngine, MemoryEngine};
use parking_lot::Mutex;
use tempfile::TempDir;
use twinkv::{
    BackendSelector, Config, EngineKind, NativeEngine, PortableEngine, Store, TwinError,
    WalSyncStrategy,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn portable_selector() -> BackendSelector {
    BackendSelector::new(
        Arc::new(FailingEngine::unavailable(EngineKind::Native)),
        Arc::new(PortableEngine),
    )
}

fn setup_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .path(temp_dir.path().join("db"))
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_with(setup_config(&temp_dir), portable_selector()).unwrap();
    (temp_dir, store)
}

fn setup_memory_store(engine: MemoryEngine) -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let selector = BackendSelector::new(
        Arc::new(FailingEngine::unavailable(EngineKind::Native)),
        Arc::new(engine),
    );
    let store = Store::open_with(setup_config(&temp_dir), selector).unwrap();
    (temp_dir, store)
}

fn collect_keys(store: &Store, start: &[u8]) -> Vec<Vec<u8>> {
    store
        .search(start)
        .unwrap()
        .map(|entry| entry.unwrap().key().to_vec())
        .collect()
}

// =============================================================================
// Point Operation Tests
// =============================================================================

#[test]
fn test_put_get_roundtrip() {
    let (_temp, store) = setup_temp_store();

    store.put(b"key1", b"value1").unwrap();

    assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
}

#[test]
fn test_get_missing_key_returns_none() {
    let (_temp, store) = setup_temp_store();

    assert_eq!(store.get(b"missing").unwrap(), None);
}

#[test]
fn test_empty_value_differs_from_absent() {
    let (_temp, store) = setup_temp_store();

    store.put(b"empty", b"").unwrap();

    assert_eq!(store.get(b"empty").unwrap(), Some(Vec::new()));
    assert_eq!(store.get(b"absent").unwrap(), None);
}

#[test]
fn test_overwrite_keeps_latest_value() {
    let (_temp, store) = setup_temp_store();

    store.put(b"key", b"v1").unwrap();
    store.put(b"key", b"v2").unwrap();

    assert_eq!(store.get(b"key").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_remove_existing_and_missing_keys() {
    let (_temp, store) = setup_temp_store();

    store.put(b"key", b"value").unwrap();
    store.remove(b"key").unwrap();
    store.remove(b"never-written").unwrap();

    assert_eq!(store.get(b"key").unwrap(), None);
}

#[test]
fn test_binary_keys_and_values() {
    let (_temp, store) = setup_temp_store();
    let key = [0u8, 255, 1, 0];
    let value = [0u8; 300];

    store.put(&key, &value).unwrap();

    assert_eq!(store.get(&key).unwrap(), Some(value.to_vec()));
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_put_all_applies_every_entry() {
    let (_temp, store) = setup_temp_store();

    store
        .put_all(vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())])
        .unwrap();

    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_put_all_empty_is_noop() {
    let (_temp, store) = setup_temp_store();

    store.put_all(Vec::<(Vec<u8>, Vec<u8>)>::new()).unwrap();

    assert!(collect_keys(&store, b"").is_empty());
}

#[test]
fn test_put_all_later_duplicate_wins() {
    let (_temp, store) = setup_temp_store();

    store
        .put_all([(&b"k"[..], &b"first"[..]), (&b"k"[..], &b"second"[..])])
        .unwrap();

    assert_eq!(store.get(b"k").unwrap(), Some(b"second".to_vec()));
}

#[test]
fn test_remove_all_removes_listed_keys_only() {
    let (_temp, store) = setup_temp_store();
    store
        .put_all([(b"a", b"1"), (b"b", b"2"), (b"c", b"3")])
        .unwrap();

    store.remove_all([b"a", b"c"]).unwrap();

    assert_eq!(collect_keys(&store, b""), vec![b"b".to_vec()]);
}

#[test]
fn test_batch_writer_is_invisible_until_commit() {
    let (_temp, store) = setup_temp_store();
    store.put(b"gone", b"x").unwrap();

    let mut batch = store.batch().unwrap();
    batch.put(b"new", b"1").delete(b"gone");
    assert_eq!(batch.len(), 2);

    assert_eq!(store.get(b"new").unwrap(), None);
    assert_eq!(store.get(b"gone").unwrap(), Some(b"x".to_vec()));

    batch.commit().unwrap();

    assert_eq!(store.get(b"new").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"gone").unwrap(), None);
}

#[test]
fn test_batch_writer_abort_discards_operations() {
    let (_temp, store) = setup_temp_store();

    let mut batch = store.batch().unwrap();
    batch.put(b"key", b"value");
    batch.abort();

    assert_eq!(store.get(b"key").unwrap(), None);
}

#[test]
fn test_batch_writer_dropped_without_commit() {
    let (_temp, store) = setup_temp_store();

    {
        let mut batch = store.batch().unwrap();
        batch.put(b"key", b"value");
    }

    assert_eq!(store.get(b"key").unwrap(), None);
}

#[test]
fn test_batch_write_failure_is_reported() {
    let (_temp, store) = setup_memory_store(MemoryEngine::new(EngineKind::Portable).failing_write());

    let err = store.put_all([(b"a", b"1")]).unwrap_err();

    match err {
        TwinError::BatchWrite(source) => assert!(matches!(*source, TwinError::Io(_))),
        other => panic!("expected BatchWrite, got {:?}", other),
    }
    assert_eq!(store.get(b"a").unwrap(), None);
}

// =============================================================================
// Cursor Tests
// =============================================================================

#[test]
fn test_search_starts_at_first_key_not_below_start() {
    let (_temp, store) = setup_temp_store();
    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();
    store.put(b"c", b"3").unwrap();

    let mut cursor = store.search(b"b").unwrap();

    assert!(cursor.has_next().unwrap());
    let first = cursor.next_entry().unwrap();
    assert_eq!((first.key(), first.value()), (&b"b"[..], &b"2"[..]));
    let second = cursor.next_entry().unwrap();
    assert_eq!((second.key(), second.value()), (&b"c"[..], &b"3"[..]));
    assert!(!cursor.has_next().unwrap());
    cursor.close();
}

#[test]
fn test_search_between_keys_and_past_end() {
    let (_temp, store) = setup_temp_store();
    store.put_all([(b"a", b"1"), (b"c", b"3")]).unwrap();

    assert_eq!(collect_keys(&store, b"b"), vec![b"c".to_vec()]);
    assert!(collect_keys(&store, b"d").is_empty());
}

#[test]
fn test_load_all_returns_keys_in_byte_order() {
    let (_temp, store) = setup_temp_store();
    for key in [&b"b"[..], b"a", b"\xff", b"ab", b"\x00"] {
        store.put(key, b"v").unwrap();
    }

    let keys = collect_keys(&store, b"");

    assert_eq!(
        keys,
        vec![
            b"\x00".to_vec(),
            b"a".to_vec(),
            b"ab".to_vec(),
            b"b".to_vec(),
            b"\xff".to_vec()
        ]
    );
}

#[test]
fn test_cursor_pages_through_small_batches() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("db"))
        .cursor_batch_size(3)
        .build();
    let store = Store::open_with(config, portable_selector()).unwrap();
    for i in 0..20u32 {
        store.put(format!("key{:02}", i).as_bytes(), b"v").unwrap();
    }

    let keys = collect_keys(&store, b"");

    let expected: Vec<Vec<u8>> = (0..20u32)
        .map(|i| format!("key{:02}", i).into_bytes())
        .collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_cursor_on_empty_store() {
    let (_temp, store) = setup_temp_store();

    let mut cursor = store.load_all().unwrap();

    assert!(!cursor.has_next().unwrap());
    assert!(matches!(cursor.next_entry(), Err(TwinError::IteratorExhausted)));
}

#[test]
fn test_cursor_exhausted_after_last_entry() {
    let (_temp, store) = setup_temp_store();
    store.put(b"only", b"1").unwrap();

    let mut cursor = store.load_all().unwrap();
    cursor.next_entry().unwrap();

    assert!(matches!(cursor.next_entry(), Err(TwinError::IteratorExhausted)));
    assert!(matches!(cursor.next_entry(), Err(TwinError::IteratorExhausted)));
}

#[test]
fn test_remove_current_deletes_last_returned_key() {
    let (_temp, store) = setup_temp_store();
    store
        .put_all([(b"a", b"1"), (b"b", b"2"), (b"c", b"3")])
        .unwrap();

    let mut cursor = store.load_all().unwrap();
    while cursor.has_next().unwrap() {
        let entry = cursor.next_entry().unwrap();
        if entry.key() == b"b" {
            cursor.remove_current().unwrap();
        }
    }

    assert_eq!(store.get(b"b").unwrap(), None);
    assert_eq!(collect_keys(&store, b""), vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_remove_current_without_entry_fails() {
    let (_temp, store) = setup_temp_store();
    store.put(b"a", b"1").unwrap();

    let mut cursor = store.load_all().unwrap();
    assert!(matches!(cursor.remove_current(), Err(TwinError::NoCurrentEntry)));

    cursor.next_entry().unwrap();
    cursor.remove_current().unwrap();
    assert!(matches!(cursor.remove_current(), Err(TwinError::NoCurrentEntry)));
}

// =============================================================================
// Flush and Close Tests
// =============================================================================

#[test]
fn test_flush_keeps_data_and_store_usable() {
    let (_temp, store) = setup_temp_store();
    store.put(b"a", b"1").unwrap();

    store.flush().unwrap();

    assert!(store.is_open());
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    store.put(b"b", b"2").unwrap();
    assert_eq!(collect_keys(&store, b""), vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn test_cursor_after_flush_is_stale() {
    let (_temp, store) = setup_temp_store();
    store.put_all([(b"a", b"1"), (b"b", b"2")]).unwrap();

    let mut cursor = store.load_all().unwrap();
    cursor.next_entry().unwrap();
    store.flush().unwrap();

    assert!(cursor.is_stale());
    assert!(matches!(cursor.has_next(), Err(TwinError::StaleHandle)));
    assert!(matches!(cursor.remove_current(), Err(TwinError::StaleHandle)));
}

#[test]
fn test_batch_after_flush_is_stale() {
    let (_temp, store) = setup_temp_store();

    let mut batch = store.batch().unwrap();
    batch.put(b"a", b"1");
    store.flush().unwrap();

    assert!(matches!(batch.commit(), Err(TwinError::StaleHandle)));
    assert_eq!(store.get(b"a").unwrap(), None);
}

#[test]
fn test_operations_after_close_fail() {
    let (_temp, store) = setup_temp_store();
    store.close().unwrap();

    assert!(!store.is_open());
    assert_eq!(store.engine_kind(), None);
    assert!(matches!(store.get(b"a"), Err(TwinError::Closed)));
    assert!(matches!(store.put(b"a", b"1"), Err(TwinError::Closed)));
    assert!(matches!(store.remove(b"a"), Err(TwinError::Closed)));
    assert!(matches!(store.search(b""), Err(TwinError::Closed)));
    assert!(matches!(store.batch(), Err(TwinError::Closed)));
    assert!(matches!(store.flush(), Err(TwinError::Closed)));
}

#[test]
fn test_close_is_idempotent() {
    let (_temp, store) = setup_temp_store();

    store.close().unwrap();
    store.close().unwrap();
}

#[test]
fn test_cursor_and_batch_after_close_are_stale() {
    let (_temp, store) = setup_temp_store();
    store.put(b"a", b"1").unwrap();
    let mut cursor = store.load_all().unwrap();
    let mut batch = store.batch().unwrap();
    batch.put(b"b", b"2");

    store.close().unwrap();

    assert!(matches!(cursor.has_next(), Err(TwinError::StaleHandle)));
    assert!(matches!(batch.commit(), Err(TwinError::StaleHandle)));
}

#[test]
fn test_data_survives_close_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = Store::open_with(setup_config(&temp_dir), portable_selector()).unwrap();
        store.put_all([(b"a", b"1"), (b"b", b"2")]).unwrap();
        store.remove(b"a").unwrap();
        store.close().unwrap();
    }

    let store = Store::open_with(setup_config(&temp_dir), portable_selector()).unwrap();

    assert_eq!(store.get(b"a").unwrap(), None);
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_drop_releases_directory() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = Store::open_with(setup_config(&temp_dir), portable_selector()).unwrap();
        store.put(b"a", b"1").unwrap();
    }

    let store = Store::open_with(setup_config(&temp_dir), portable_selector()).unwrap();

    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_failed_close_reports_resource_release() {
    let engine = MemoryEngine::new(EngineKind::Portable).failing_close();
    let (_temp, store) = setup_memory_store(engine.clone());

    let err = store.close().unwrap_err();

    assert!(matches!(err, TwinError::ResourceRelease { .. }));
    assert_eq!(engine.closes(), 1);
    assert!(!store.is_open());
    store.close().unwrap();
}

#[test]
fn test_flush_reopens_even_when_close_fails() {
    let engine = MemoryEngine::new(EngineKind::Portable).failing_close();
    let (_temp, store) = setup_memory_store(engine.clone());
    store.put(b"a", b"1").unwrap();

    store.flush().unwrap();

    assert_eq!(engine.opens(), 2);
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_failed_reopen_leaves_store_closed_until_next_flush() {
    let engine = MemoryEngine::new(EngineKind::Portable).failing_open_at(2);
    let (_temp, store) = setup_memory_store(engine.clone());
    store.put_all([(b"a", b"1"), (b"b", b"2")]).unwrap();
    let mut cursor = store.load_all().unwrap();
    let mut batch = store.batch().unwrap();
    batch.put(b"c", b"3");

    let err = store.flush().unwrap_err();

    assert!(matches!(err, TwinError::StoreOpen { .. }));
    assert!(!store.is_open());
    assert_eq!(store.engine_kind(), None);
    assert!(matches!(store.get(b"a"), Err(TwinError::Closed)));
    assert!(matches!(store.put(b"x", b"y"), Err(TwinError::Closed)));
    assert!(matches!(cursor.has_next(), Err(TwinError::StaleHandle)));
    assert!(matches!(batch.commit(), Err(TwinError::StaleHandle)));

    store.flush().unwrap();

    assert!(store.is_open());
    assert_eq!(engine.opens(), 3);
    assert_eq!(engine.closes(), 1);
    assert_eq!(collect_keys(&store, b""), vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(store.get(b"c").unwrap(), None);
}

// =============================================================================
// Diagnostics Tests
// =============================================================================

#[test]
fn test_engine_kind_reports_serving_engine() {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(setup_config(&temp_dir)).unwrap();

    let kind = store.engine_kind().unwrap();

    assert_eq!(kind.is_native(), NativeEngine::is_available());
}

#[test]
fn test_log_sink_receives_engine_messages() {
    let temp_dir = TempDir::new().unwrap();
    let messages = Arc::new(Mutex::new(Vec::<String>::new()));
    let captured = Arc::clone(&messages);
    let config = Config::builder()
        .path(temp_dir.path().join("db"))
        .log_sink(move |msg| captured.lock().push(msg.to_string()))
        .build();

    let store = Store::open_with(config, portable_selector()).unwrap();
    store.close().unwrap();

    let messages = messages.lock();
    assert!(messages.iter().any(|m| m.starts_with("opened")));
    assert!(messages.iter().any(|m| m.starts_with("closed")));
}

#[test]
fn test_config_is_kept() {
    let (_temp, store) = setup_temp_store();

    assert_eq!(store.config().cursor_batch_size, 256);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_clones_share_one_store() {
    let (_temp, store) = setup_temp_store();
    let other = store.clone();

    other.put(b"shared", b"yes").unwrap();

    assert_eq!(store.get(b"shared").unwrap(), Some(b"yes".to_vec()));
    other.close().unwrap();
    assert!(!store.is_open());
}

#[test]
fn test_concurrent_writes_during_flush() {
    let (_temp, store) = setup_temp_store();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}_k{:02}", t, i);
                    store.put(key.as_bytes(), b"value").unwrap();
                    assert_eq!(store.get(key.as_bytes()).unwrap(), Some(b"value".to_vec()));
                }
            })
        })
        .collect();

    for _ in 0..3 {
        store.flush().unwrap();
    }

    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(collect_keys(&store, b"").len(), 200);
}
