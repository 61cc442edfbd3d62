use std::path::PathBuf;
use std::time::Duration;

/// Configuration consumed by [`KvStore::open`].
///
/// Snapshots are written to the parent directory of `log_file`.
///
/// [`KvStore::open`]: crate::KvStore::open
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// path to the transaction log file
    pub log_file: PathBuf,

    /// how often the background task attempts a snapshot (default: 1 hour)
    pub snapshot_interval: Duration,

    /// when false the store runs purely in-memory: no transaction log,
    /// no snapshots, and no background task (default: true)
    pub durability: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("./kvd/transaction.log"),
            snapshot_interval: Duration::from_secs(60 * 60),
            durability: true,
        }
    }
}

impl StoreConfig {
    /// Create a config with the given transaction log path
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            ..Default::default()
        }
    }

    /// Set the snapshot interval
    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Disable durability, making the store purely in-memory
    pub fn in_memory(mut self) -> Self {
        self.durability = false;
        self
    }

    /// the directory that holds the transaction log and all snapshot files
    pub fn data_dir(&self) -> PathBuf {
        self.log_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
