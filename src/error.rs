use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// type alias for all operations on a [`KvStore`] that could fail with a [`KvdError`]
pub type Result<T> = std::result::Result<T, KvdError>;

/// Error variants used by the kvd store and its network layer.
/// It wraps any lower level errors from third party crates
#[derive(Error)]
pub enum KvdError {
    /// variant for errors caused by std::io
    #[error("IO error")]
    Io {
        /// source of the IO Error
        #[from]
        source: io::Error,
    },

    /// variant for errors caused during type serialization/deserialization
    #[error("serialization/deserialization error")]
    Serialization(#[from] serde_json::Error),

    /// variant for errors while formatting a timestamp
    #[error("timestamp formatting error")]
    TimeFormat(#[from] time::error::Format),

    /// variant for errors while parsing a timestamp
    #[error("timestamp parsing error")]
    TimeParse(#[from] time::error::Parse),

    /// variant for errors when parsing strings to some other type
    #[error("{}", .0)]
    Parsing(String),

    /// variant for an empty or otherwise unusable key
    #[error("invalid key: {}", .0)]
    InvalidKey(String),

    /// a key or value is an invalid UTF-8 sequence
    #[error("{}", .0)]
    Utf8Error(#[from] FromUtf8Error),

    /// variant for a poisoned dictionary or log lock
    #[error("{}", .0)]
    Locking(String),

    /// catch-all variant for reporting error message strings to clients
    #[error("{}", .0)]
    StringErr(String),
}

/// a custom Debug implementation that will write the entire error chain
impl std::fmt::Debug for KvdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// writes the entire error chain of the given error `e`, to the formatter.
fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by: {}", cause)?;
        current = cause.source();
    }
    Ok(())
}
