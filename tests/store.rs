//! End-to-end tests of the store lifecycle:
//! open → mutate → snapshot → close → recover.

use std::collections::HashMap;
use std::fs;
use std::thread;
use std::time::Duration;

use kvd::{KvStore, StoreConfig};

mod common {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use kvd::StoreConfig;

    /// a config whose transaction log lives inside `dir`, with a snapshot
    /// interval long enough that only explicitly requested snapshots run
    pub fn temp_config(dir: &Path) -> StoreConfig {
        StoreConfig::new(log_path(dir)).snapshot_interval(Duration::from_secs(3600))
    }

    pub fn log_path(dir: &Path) -> PathBuf {
        dir.join("transaction.log")
    }

    pub fn snapshot_count(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy().into_owned();
                name.starts_with("snapshot_") && name.ends_with(".json")
            })
            .count()
    }
}

#[test]
fn basic_set_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();

    store.set("name".to_string(), "\"Tom\"".to_string()).unwrap();
    assert_eq!(store.get("name").unwrap(), Some("\"Tom\"".to_string()));
    assert_eq!(store.get("missing").unwrap(), None);

    store.close();
}

#[test]
fn overwrite_keeps_the_latest_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();

    store.set("a".to_string(), "1".to_string()).unwrap();
    store.set("a".to_string(), "2".to_string()).unwrap();

    assert_eq!(store.get("a").unwrap(), Some("2".to_string()));
    assert_eq!(store.len().unwrap(), 1);

    store.close();
}

#[test]
fn restart_preserves_state() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("k1".to_string(), "\"v1\"".to_string()).unwrap();
    store.set("k2".to_string(), "[1,2,3]".to_string()).unwrap();
    let before = store.get_all().unwrap();
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get_all().unwrap(), before);
    assert_eq!(store.get("k2").unwrap(), Some("[1,2,3]".to_string()));
    store.close();
}

#[test]
fn snapshot_truncates_the_log() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("x".to_string(), "true".to_string()).unwrap();
    store.take_snapshot().unwrap();

    // the log is empty and the snapshot carries the value verbatim
    assert_eq!(fs::metadata(common::log_path(dir.path())).unwrap().len(), 0);
    assert_eq!(common::snapshot_count(dir.path()), 1);
    let snapshot_file = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().starts_with("snapshot_"))
        .unwrap();
    let contents = fs::read_to_string(snapshot_file.path()).unwrap();
    assert!(contents.contains(r#""x":true"#));
    store.close();
    drop(store);

    // recovery from the snapshot alone
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("x").unwrap(), Some("true".to_string()));
    store.close();
}

#[test]
fn delete_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("x".to_string(), "1".to_string()).unwrap();
    assert_eq!(store.delete("x").unwrap(), Some("1".to_string()));
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("x").unwrap(), None);
    store.close();
}

#[test]
fn delete_of_absent_key_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.delete("ghost").unwrap(), None);
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("ghost").unwrap(), None);
    assert!(store.is_empty().unwrap());
    store.close();
}

#[test]
fn delete_all_survives_a_stale_snapshot() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("a".to_string(), "1".to_string()).unwrap();
    store.set("b".to_string(), "2".to_string()).unwrap();
    // leave a non-empty snapshot on disk, then clear everything
    store.take_snapshot().unwrap();
    store.set("c".to_string(), "3".to_string()).unwrap();
    store.delete_all().unwrap();

    assert!(store.get_all().unwrap().is_empty());
    assert_eq!(fs::metadata(common::log_path(dir.path())).unwrap().len(), 0);
    store.close();
    drop(store);

    // the fresh empty snapshot outranks the stale one, so a restart must
    // not resurrect a, b, or c
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert!(store.get_all().unwrap().is_empty());
    store.close();
}

#[test]
fn recovery_skips_a_corrupt_trailing_line() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("a".to_string(), "1".to_string()).unwrap();
    store.set("b".to_string(), "2".to_string()).unwrap();
    store.close();
    drop(store);

    // simulate a crash that tore the last append
    let log = common::log_path(dir.path());
    let mut contents = fs::read_to_string(&log).unwrap();
    contents.push_str("[2024-01-01T00:0");
    fs::write(&log, contents).unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
    assert_eq!(store.get("b").unwrap(), Some("2".to_string()));
    assert_eq!(store.len().unwrap(), 2);
    store.close();
}

#[test]
fn enumerations_are_independent_copies() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();

    store.set("a".to_string(), "1".to_string()).unwrap();

    let mut all = store.get_all().unwrap();
    all.insert("b".to_string(), "2".to_string());
    all.remove("a");
    let mut keys = store.get_keys().unwrap();
    keys.push("c".to_string());
    let mut values = store.get_values().unwrap();
    values.clear();

    assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
    assert_eq!(store.get("b").unwrap(), None);
    assert_eq!(store.get("c").unwrap(), None);
    assert_eq!(store.len().unwrap(), 1);

    store.close();
}

#[test]
fn concurrent_writers_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();

    let mut handles = Vec::new();
    for i in 0..100 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            store.set(format!("key{}", i), format!("{}", i)).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get_keys().unwrap().len(), 100);
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get_keys().unwrap().len(), 100);
    for i in 0..100 {
        assert_eq!(
            store.get(&format!("key{}", i)).unwrap(),
            Some(format!("{}", i))
        );
    }
    store.close();
}

#[test]
fn reads_are_never_torn() {
    let dir = tempfile::tempdir().unwrap();
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();

    let first = format!("\"{}\"", "a".repeat(1000));
    let second = format!("\"{}\"", "b".repeat(1000));
    store.set("k".to_string(), first.clone()).unwrap();

    let writer = {
        let store = store.clone();
        let (first, second) = (first.clone(), second.clone());
        thread::spawn(move || {
            for i in 0..200 {
                let value = if i % 2 == 0 { &second } else { &first };
                store.set("k".to_string(), value.clone()).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let value = store.get("k").unwrap().unwrap();
        assert!(value == first || value == second);
    }
    writer.join().unwrap();

    store.close();
}

#[test]
fn large_key_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let key = "k".repeat(10 * 1024);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set(key.clone(), "1".to_string()).unwrap();
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get(&key).unwrap(), Some("1".to_string()));
    store.close();
}

#[test]
fn rich_json_values_survive_replay() {
    let dir = tempfile::tempdir().unwrap();
    let value = r#"{"quote": "she said \"hi\"", "emoji": "🗄️", "nested": {"list": [1, null, {"x": 2.5}]}}"#;

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("doc".to_string(), value.to_string()).unwrap();
    store.close();
    drop(store);

    // replayed from the log
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("doc").unwrap(), Some(value.to_string()));
    store.take_snapshot().unwrap();
    store.close();
    drop(store);

    // and recovered from a snapshot
    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("doc").unwrap(), Some(value.to_string()));
    store.close();
}

#[test]
fn fresh_directory_bootstraps_empty() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("does").join("not").join("exist");

    let store = KvStore::open(common::temp_config(&nested)).unwrap();
    assert!(store.is_empty().unwrap());
    assert!(common::log_path(&nested).exists());
    store.close();
}

#[test]
fn compaction_preserves_recovered_state() {
    let dir = tempfile::tempdir().unwrap();

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    store.set("a".to_string(), "1".to_string()).unwrap();
    store.set("a".to_string(), "2".to_string()).unwrap();
    store.set("b".to_string(), "10".to_string()).unwrap();
    store.delete("b").unwrap();
    store.set("c".to_string(), "3".to_string()).unwrap();
    let before = store.get_all().unwrap();

    store.compact().unwrap();
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get_all().unwrap(), before);

    let mut expected = HashMap::new();
    expected.insert("a".to_string(), "2".to_string());
    expected.insert("c".to_string(), "3".to_string());
    assert_eq!(store.get_all().unwrap(), expected);
    store.close();
}

#[test]
fn background_task_snapshots_on_its_interval() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(common::log_path(dir.path()))
        .snapshot_interval(Duration::from_millis(50));

    let store = KvStore::open(config).unwrap();
    store.set("x".to_string(), "1".to_string()).unwrap();

    // give the ticker a few intervals to fire
    thread::sleep(Duration::from_secs(1));

    assert!(common::snapshot_count(dir.path()) >= 1);
    assert_eq!(fs::metadata(common::log_path(dir.path())).unwrap().len(), 0);
    store.close();
    drop(store);

    let store = KvStore::open(common::temp_config(dir.path())).unwrap();
    assert_eq!(store.get("x").unwrap(), Some("1".to_string()));
    store.close();
}
