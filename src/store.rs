//! The store façade tying the dictionary, transaction log, and snapshots
//! together.
//!
//! [`KvStore`] owns all state. On open it rebuilds the dictionary from the
//! latest snapshot plus the tail of the transaction log, then starts a
//! background task that periodically snapshots the dictionary and truncates
//! the log. Handles are cheap to clone and share one underlying store.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::dictionary::Dictionary;
use crate::error::{KvdError, Result};
use crate::record::{LogRecord, Operation};
use crate::snapshot::Snapshot;
use crate::tlog::TransactionLog;

// the durable half of the store; absent when running purely in-memory
#[derive(Debug)]
struct Durability {
    tlog: TransactionLog,
    snapshot_dir: PathBuf,
}

/// The key-value store.
///
/// Keys are non-empty strings; values are opaque strings, by convention
/// well-formed JSON (the store does not validate them on write). All seven
/// operations are safe to call from many threads at once: reads take a
/// shared lock, mutations an exclusive one, and every successful mutation is
/// appended to the transaction log before it is applied in memory.
///
/// One `KvStore` instance owns its log file and snapshot directory
/// exclusively; running two stores against the same files is not supported.
#[derive(Clone)]
pub struct KvStore {
    dict: Arc<Dictionary>,
    durability: Option<Arc<Durability>>,
    ticker: Option<Arc<Ticker>>,
}

impl KvStore {
    /// opens a store with the given configuration.
    ///
    /// In durable mode this creates the log file and its directory if
    /// absent, rebuilds the dictionary from the latest snapshot plus the
    /// log, and starts the periodic snapshot task. Recovery failures that
    /// would leave the dictionary inconsistent (an undecodable snapshot, an
    /// unreadable log file) fail construction; individual malformed log
    /// lines are skipped with a warning.
    pub fn open(config: StoreConfig) -> Result<KvStore> {
        let dict = Arc::new(Dictionary::new());

        if !config.durability {
            info!("opening in-memory store (durability disabled)");
            return Ok(KvStore {
                dict,
                durability: None,
                ticker: None,
            });
        }

        info!("opening store with transaction log at {:?}", config.log_file);
        let snapshot_dir = config.data_dir();
        fs::create_dir_all(&snapshot_dir)?;
        let tlog = TransactionLog::open(&config.log_file)?;

        if let Some(snapshot) = Snapshot::load_latest(&snapshot_dir)? {
            dict.replace(snapshot.into_entries())?;
        }

        let records = tlog.read_all()?;
        let replayed = records.len();
        {
            let mut map = dict.write()?;
            for record in records {
                match record.op {
                    Operation::Set => {
                        map.insert(record.key, record.value);
                    }
                    Operation::Delete => {
                        map.remove(&record.key);
                    }
                }
            }
        }
        info!(
            "recovered {} entries ({} log records replayed)",
            dict.len()?,
            replayed
        );

        let durability = Arc::new(Durability { tlog, snapshot_dir });
        let ticker = Ticker::spawn(
            config.snapshot_interval,
            Arc::clone(&dict),
            Arc::clone(&durability),
        )?;

        Ok(KvStore {
            dict,
            durability: Some(durability),
            ticker: Some(Arc::new(ticker)),
        })
    }

    /// inserts or overwrites the entry for `key`.
    ///
    /// The SET record is appended to the transaction log before the
    /// in-memory map changes; if the append fails the error propagates and
    /// the dictionary is left untouched.
    ///
    /// # Errors
    /// returns [`KvdError::InvalidKey`] for an empty key, or the underlying
    /// IO error if the log append fails
    pub fn set(&self, key: String, value: String) -> Result<()> {
        if key.is_empty() {
            return Err(KvdError::InvalidKey("key must not be empty".to_string()));
        }

        let mut map = self.dict.write()?;
        if let Some(durable) = &self.durability {
            durable.tlog.append(&LogRecord::set(key.as_str(), value.as_str()))?;
        }
        map.insert(key, value);
        Ok(())
    }

    /// the value stored under `key`; `Ok(None)` when the key is absent
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.dict.get(key)
    }

    /// an independent copy of the full mapping; mutating it does not affect
    /// the store
    pub fn get_all(&self) -> Result<HashMap<String, String>> {
        self.dict.entries()
    }

    /// an independent copy of all keys, in no particular order
    pub fn get_keys(&self) -> Result<Vec<String>> {
        self.dict.keys()
    }

    /// an independent copy of all values, in no particular order
    pub fn get_values(&self) -> Result<Vec<String>> {
        self.dict.values()
    }

    /// removes `key`, returning the value it held.
    ///
    /// Deleting an absent key is a no-op that returns `Ok(None)` and writes
    /// no log record.
    pub fn delete(&self, key: &str) -> Result<Option<String>> {
        let mut map = self.dict.write()?;
        if !map.contains_key(key) {
            return Ok(None);
        }
        if let Some(durable) = &self.durability {
            durable.tlog.append(&LogRecord::delete(key))?;
        }
        Ok(map.remove(key))
    }

    /// removes every entry.
    ///
    /// In durable mode a fresh empty snapshot is written before the log is
    /// truncated, so a restart can never repopulate from an older snapshot
    /// left on disk. The durable steps run first, like the appends in
    /// [`set`] and [`delete`]; if either fails the error propagates and the
    /// in-memory map is left untouched.
    ///
    /// [`set`]: KvStore::set
    /// [`delete`]: KvStore::delete
    pub fn delete_all(&self) -> Result<()> {
        let mut map = self.dict.write()?;
        if let Some(durable) = &self.durability {
            Snapshot::empty().write(&durable.snapshot_dir)?;
            durable.tlog.clear()?;
        }
        map.clear();
        Ok(())
    }

    /// number of entries currently stored
    pub fn len(&self) -> Result<usize> {
        self.dict.len()
    }

    /// true when the store holds no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// takes a snapshot immediately, on the caller's thread.
    ///
    /// This is the same cycle the background task runs on its interval:
    /// serialize the dictionary to a timestamp-named file, then truncate the
    /// transaction log. A truncation failure after a successful write is
    /// only a warning, the next snapshot covers the same records again.
    /// No-op for an in-memory store.
    pub fn take_snapshot(&self) -> Result<()> {
        match &self.durability {
            Some(durable) => snapshot_cycle(&self.dict, durable),
            None => Ok(()),
        }
    }

    /// rewrites the transaction log keeping only the latest SET per key.
    ///
    /// Purely an optimization of log size; snapshotting subsumes it.
    /// No-op for an in-memory store.
    pub fn compact(&self) -> Result<()> {
        match &self.durability {
            Some(durable) => durable.tlog.compact(),
            None => Ok(()),
        }
    }

    /// stops the background snapshot task and waits for it to exit.
    ///
    /// All clones of this store share the one task, so closing any handle
    /// closes it for all of them. Dropping the last handle does the same.
    pub fn close(&self) {
        if let Some(ticker) = &self.ticker {
            ticker.stop();
        }
    }
}

// one snapshot pass: serialize the dictionary under the read lock, then
// truncate the log. The read lock is held across the truncation as well;
// writers append under the write lock, so no record for an un-snapshotted
// mutation can land in the window between write and truncate. Lock order
// (dictionary, then log mutex) matches the mutation path.
fn snapshot_cycle(dict: &Dictionary, durable: &Durability) -> Result<()> {
    let map = dict.read()?;
    let snapshot = Snapshot::capture(&map)?;
    let path = snapshot.write(&durable.snapshot_dir)?;

    if let Err(e) = durable.tlog.clear() {
        warn!(
            "snapshot {:?} written but log truncation failed (will retry next interval): {:?}",
            path, e
        );
    } else {
        info!("snapshot {:?} taken ({} entries), log truncated", path, map.len());
    }
    Ok(())
}

// the periodic snapshot task: a named thread woken by a crossbeam tick
// channel, stopped through a shutdown channel
#[derive(Debug)]
struct Ticker {
    shutdown_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    fn spawn(
        interval: Duration,
        dict: Arc<Dictionary>,
        durable: Arc<Durability>,
    ) -> Result<Ticker> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("kvd-snapshot".to_string())
            .spawn(move || loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = snapshot_cycle(&dict, &durable) {
                            error!("failed to take snapshot: {:?}", e);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("snapshot task shutting down");
                        break;
                    }
                }
            })?;

        Ok(Ticker {
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    fn stop(&self) {
        // the task may already have exited; a failed send is fine
        let _ = self.shutdown_tx.send(());
        if let Ok(mut guard) = self.handle.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn durable_config(dir: &std::path::Path) -> StoreConfig {
        StoreConfig::new(dir.join("transaction.log"))
            .snapshot_interval(Duration::from_secs(3600))
    }

    #[test]
    fn empty_keys_are_rejected() {
        let store = KvStore::open(StoreConfig::default().in_memory()).unwrap();
        assert!(matches!(
            store.set(String::new(), "1".to_string()),
            Err(KvdError::InvalidKey(_))
        ));
    }

    #[test]
    fn in_memory_store_touches_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("transaction.log")).in_memory();
        let store = KvStore::open(config).unwrap();

        store.set("a".to_string(), "1".to_string()).unwrap();
        store.delete("a").unwrap();
        store.take_snapshot().unwrap();
        store.compact().unwrap();
        store.delete_all().unwrap();

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_append_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("store");
        let store = KvStore::open(durable_config(&data_dir)).unwrap();
        store.set("a".to_string(), "1".to_string()).unwrap();

        // make the append path unwritable by removing the data directory
        fs::remove_dir_all(&data_dir).unwrap();

        assert!(store.set("b".to_string(), "2".to_string()).is_err());
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        store.close();
    }

    #[test]
    fn failed_delete_all_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("store");
        let store = KvStore::open(durable_config(&data_dir)).unwrap();
        store.set("a".to_string(), "1".to_string()).unwrap();

        // make the snapshot path unwritable by removing the data directory
        fs::remove_dir_all(&data_dir).unwrap();

        assert!(store.delete_all().is_err());
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        store.close();
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(durable_config(&dir.path().join("store"))).unwrap();
        store.close();
        store.close();
    }
}
