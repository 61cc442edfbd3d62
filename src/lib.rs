//! # kvd
//! A durable, multi-threaded, in-process key-value store mapping [`String`]
//! keys to opaque JSON-encoded [`String`] values, served over TCP.
//!
//! Mutations are appended to a transaction log before they apply in memory,
//! and a background task periodically writes a full snapshot of the
//! dictionary and truncates the log, so recovery on restart is
//! `latest snapshot + tail of log` and bounded in time.
//!
//! [`String`]: https://doc.rust-lang.org/std/string/struct.String.html
//!
//! ## Example
//! ```no_run
//! use kvd::{KvStore, StoreConfig};
//!
//! # fn main() -> kvd::Result<()> {
//! let store = KvStore::open(StoreConfig::new("./data/transaction.log"))?;
//! store.set("name".to_string(), "\"Tom\"".to_string())?;
//! assert_eq!(store.get("name")?, Some("\"Tom\"".to_string()));
//! store.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
mod dictionary;
pub mod error;
pub mod record;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod thread_pool;
pub mod tlog;

pub use client::KvdClient;
pub use command::{Request, Response};
pub use config::StoreConfig;
pub use error::{KvdError, Result};
pub use server::KvdServer;
pub use store::KvStore;
