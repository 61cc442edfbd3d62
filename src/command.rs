use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// These are the request "commands" that can be made to the key/value store
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    /// retrieve the value stored under a key
    Get {
        /// the key to look up
        key: String,
    },
    /// insert or overwrite a key/value entry
    Set {
        /// the key to store under
        key: String,
        /// the value to store, by convention a JSON document
        value: String,
    },
    /// remove a key, returning the value it held
    Delete {
        /// the key to remove
        key: String,
    },
    /// retrieve an independent copy of every entry
    GetAll,
    /// retrieve every key
    GetKeys,
    /// retrieve every value
    GetValues,
    /// remove every entry and clear the transaction log
    DeleteAll,
}

/// The responses a server can send back for a [`Request`]
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    /// acknowledgement carrying no data (Set, DeleteAll)
    Ok,
    /// a single, possibly absent, value (Get, Delete)
    Value(Option<String>),
    /// the full mapping (GetAll)
    Entries(HashMap<String, String>),
    /// all keys (GetKeys)
    Keys(Vec<String>),
    /// all values (GetValues)
    Values(Vec<String>),
    /// the operation failed server-side
    Err(String),
}
