//! Full-dictionary snapshots.
//!
//! A snapshot is a JSON file `{ "data": {..}, "timestamp": ".." }` holding
//! every entry of the dictionary at one instant, with the stored values
//! embedded verbatim as raw JSON tokens. Snapshot filenames carry a
//! `YYYYMMDDhhmmss` stamp so that lexicographic order equals chronological
//! order; the loader always takes the greatest. Old snapshots are never
//! deleted.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::Result;

const SNAPSHOT_PREFIX: &str = "snapshot_";
const SNAPSHOT_SUFFIX: &str = ".json";

/// A point-in-time serialization of the full dictionary.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// every entry of the dictionary, values as raw JSON tokens
    pub data: HashMap<String, Box<RawValue>>,

    /// the instant the snapshot was captured
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Snapshot {
    /// captures a snapshot of the given entries, stamped with the current time.
    ///
    /// # Errors
    /// returns a serialization error if any value is not well-formed JSON;
    /// values are stored verbatim so this is the first place they are checked
    pub fn capture(entries: &HashMap<String, String>) -> Result<Snapshot> {
        let mut data = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            data.insert(key.clone(), RawValue::from_string(value.clone())?);
        }

        Ok(Snapshot {
            data,
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    /// an empty snapshot stamped with the current time
    pub fn empty() -> Snapshot {
        Snapshot {
            data: HashMap::new(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// writes this snapshot into `dir` as `snapshot_YYYYMMDDhhmmss.json`,
    /// readable only by the owner, and fsyncs it before returning.
    ///
    /// returns the path of the file that was written
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let stamp_format = format_description!("[year][month][day][hour][minute][second]");
        let stamp = self.timestamp.format(&stamp_format)?;
        let path = dir.join(format!("{}{}{}", SNAPSHOT_PREFIX, stamp, SNAPSHOT_SUFFIX));

        let bytes = serde_json::to_vec(self)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        debug!("wrote snapshot {:?} ({} entries)", path, self.data.len());
        Ok(path)
    }

    /// loads the most recent snapshot in `dir`, if any.
    ///
    /// Filenames sort lexicographically, which for the embedded timestamp
    /// stamp is chronological order. `Ok(None)` means no snapshot is present,
    /// which is not an error: the store falls back to replaying the log alone.
    ///
    /// # Errors
    /// returns an error if the directory cannot be scanned or the chosen
    /// snapshot file cannot be read or decoded
    pub fn load_latest(dir: &Path) -> Result<Option<Snapshot>> {
        let mut latest: Option<PathBuf> = None;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };
            if !name.starts_with(SNAPSHOT_PREFIX) || !name.ends_with(SNAPSHOT_SUFFIX) {
                continue;
            }
            let path = entry.path();
            match &latest {
                Some(current) if path.file_name() <= current.file_name() => {}
                _ => latest = Some(path),
            }
        }

        let path = match latest {
            Some(p) => p,
            None => return Ok(None),
        };

        let bytes = fs::read(&path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        debug!(
            "loaded snapshot {:?} taken at {}",
            path,
            snapshot.timestamp.format(&Rfc3339)?
        );
        Ok(Some(snapshot))
    }

    /// consumes the snapshot, yielding its entries as plain strings
    pub fn into_entries(self) -> HashMap<String, String> {
        self.data
            .into_iter()
            .map(|(key, value)| (key, value.get().to_string()))
            .collect()
    }
}
