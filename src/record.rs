//! The transaction log record type and its one-line text encoding.
//!
//! Each record occupies exactly one newline-terminated line:
//!
//! ```text
//! [<RFC3339 timestamp>] <OP> - Key: <key>, Value: <value>
//! ```
//!
//! where `<OP>` is `SET` or `DELETE`. The value may be any JSON text, it is
//! written literally after its label. A key containing the literal separator
//! `", Value: "` cannot be round-tripped through this format; the file is
//! internal to the store so no external compatibility is broken by the
//! restriction.

use std::fmt;
use std::str::FromStr;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{KvdError, Result};

/// The two mutating operations recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// a key was inserted or overwritten
    Set,
    /// a key was removed
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Set => write!(f, "SET"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for Operation {
    type Err = KvdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SET" => Ok(Operation::Set),
            "DELETE" => Ok(Operation::Delete),
            other => Err(KvdError::Parsing(format!(
                "unknown log operation: {}",
                other
            ))),
        }
    }
}

/// One entry of the transaction log: the instant a mutation was applied,
/// which operation it was, and the key/value it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// wall-clock instant at which the operation was applied
    pub timestamp: OffsetDateTime,
    /// the operation performed
    pub op: Operation,
    /// the key that was mutated
    pub key: String,
    /// the value that was set; empty for DELETE records
    pub value: String,
}

impl LogRecord {
    /// a SET record for `key`/`value`, stamped with the current time
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        LogRecord {
            timestamp: OffsetDateTime::now_utc(),
            op: Operation::Set,
            key: key.into(),
            value: value.into(),
        }
    }

    /// a DELETE record for `key`, stamped with the current time
    pub fn delete(key: impl Into<String>) -> Self {
        LogRecord {
            timestamp: OffsetDateTime::now_utc(),
            op: Operation::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// encodes this record as a single newline-terminated log line
    pub fn encode(&self) -> Result<String> {
        let timestamp = self.timestamp.format(&Rfc3339)?;
        Ok(format!(
            "[{}] {} - Key: {}, Value: {}\n",
            timestamp, self.op, self.key, self.value
        ))
    }

    /// parses one log line (without its trailing newline) back into a record
    ///
    /// # Errors
    /// returns [`KvdError::Parsing`] if the line does not match the grammar,
    /// or a timestamp parse error if the bracketed instant is not RFC 3339
    pub fn parse(line: &str) -> Result<LogRecord> {
        let rest = line
            .strip_prefix('[')
            .ok_or_else(|| KvdError::Parsing(format!("log line missing '[': {}", line)))?;

        let (ts_part, rest) = rest
            .split_once("] ")
            .ok_or_else(|| KvdError::Parsing(format!("log line missing timestamp: {}", line)))?;
        let timestamp = OffsetDateTime::parse(ts_part, &Rfc3339)?;

        let (op_part, rest) = rest
            .split_once(" - ")
            .ok_or_else(|| KvdError::Parsing(format!("log line missing operation: {}", line)))?;
        let op: Operation = op_part.parse()?;

        let rest = rest
            .strip_prefix("Key: ")
            .ok_or_else(|| KvdError::Parsing(format!("log line missing key label: {}", line)))?;
        let (key, value) = rest
            .split_once(", Value: ")
            .ok_or_else(|| KvdError::Parsing(format!("log line missing value label: {}", line)))?;

        Ok(LogRecord {
            timestamp,
            op,
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
