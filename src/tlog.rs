//! The append-only transaction log.
//!
//! Every successful mutation of the store is recorded here as one text line
//! (see [`LogRecord`]). On restart the log is replayed over the most recent
//! snapshot to reconstruct the dictionary. A mutex serializes all file
//! operations so concurrent appends can never interleave bytes.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::{KvdError, Result};
use crate::record::{LogRecord, Operation};

/// An append-only log of [`LogRecord`]s backed by a single text file.
#[derive(Debug)]
pub struct TransactionLog {
    // path of the log file; snapshots live in the same directory
    path: PathBuf,

    // serializes append/read/clear/compact so file operations never race
    file_lock: Mutex<()>,
}

impl TransactionLog {
    /// opens the transaction log at `path`, creating the file if it does
    /// not yet exist
    pub fn open(path: impl Into<PathBuf>) -> Result<TransactionLog> {
        let path = path.into();
        // touch the file so that read_all on a fresh store has something to scan
        OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(TransactionLog {
            path,
            file_lock: Mutex::new(()),
        })
    }

    /// the path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// appends one record to the end of the log.
    ///
    /// The line is handed to the OS and the file closed before this
    /// returns; an error here means the record was not recorded.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let line = record.encode()?;

        let _guard = self.lock()?;
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// reads every record currently in the log, in file order.
    ///
    /// Malformed lines (a torn tail after a crash, for instance) are
    /// reported and skipped rather than aborting the scan.
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let _guard = self.lock()?;
        self.read_all_locked()
    }

    /// truncates the log to zero length
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        let file = OpenOptions::new().write(true).create(true).open(&self.path)?;
        file.set_len(0)?;
        Ok(())
    }

    /// rewrites the log keeping only the latest SET for each key.
    ///
    /// Earlier SETs are superseded and dropped; a key whose last record is a
    /// DELETE is dropped entirely, so a subsequent recovery simply never
    /// sees it. The compacted records are written to a scratch file which is
    /// renamed over the live log.
    pub fn compact(&self) -> Result<()> {
        let _guard = self.lock()?;
        let entries = self.read_all_locked()?;

        let mut latest: HashMap<String, LogRecord> = HashMap::new();
        for record in entries {
            match record.op {
                Operation::Set => {
                    latest.insert(record.key.clone(), record);
                }
                Operation::Delete => {
                    latest.remove(&record.key);
                }
            }
        }

        let scratch = self.path.with_extension("compact");
        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&scratch)?;
            let mut writer = BufWriter::new(file);
            for record in latest.values() {
                writer.write_all(record.encode()?.as_bytes())?;
            }
            writer.flush()?;
        }
        fs::rename(&scratch, &self.path)?;

        Ok(())
    }

    // scan the file line by line; the caller must hold file_lock
    fn read_all_locked(&self) -> Result<Vec<LogRecord>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            match LogRecord::parse(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping malformed log line: {}", e),
            }
        }

        Ok(records)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.file_lock
            .lock()
            .map_err(|e| KvdError::Locking(format!("transaction log lock poisoned: {}", e)))
    }
}
