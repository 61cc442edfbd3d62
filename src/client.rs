use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::Deserialize;
use serde_json::de::IoRead;
use serde_json::Deserializer;

use crate::command::{Request, Response};
use crate::{KvdError, Result};

/// `KvdClient` contains the functionality for communicating with a [`KvdServer`]
///
/// [`KvdServer`]: crate::KvdServer
pub struct KvdClient {
    reader: Deserializer<IoRead<BufReader<TcpStream>>>,
    writer: BufWriter<TcpStream>,
}

impl KvdClient {
    /// creates a client and establishes a socket connection to the server at
    /// the given `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let tcp_reader = TcpStream::connect(addr)?;
        let tcp_writer = tcp_reader.try_clone()?;

        Ok(KvdClient {
            reader: Deserializer::from_reader(BufReader::new(tcp_reader)),
            writer: BufWriter::new(tcp_writer),
        })
    }

    /// gets the value of the specified `key` from the server.
    /// `Ok(None)` means the key does not exist
    pub fn get(&mut self, key: String) -> Result<Option<String>> {
        match self.round_trip(Request::Get { key })? {
            Response::Value(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    /// sends a set key/value request to the server
    pub fn set(&mut self, key: String, value: String) -> Result<()> {
        match self.round_trip(Request::Set { key, value })? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// removes a key from the store, returning the value it held.
    /// `Ok(None)` means the key did not exist
    pub fn delete(&mut self, key: String) -> Result<Option<String>> {
        match self.round_trip(Request::Delete { key })? {
            Response::Value(previous) => Ok(previous),
            other => Err(unexpected(other)),
        }
    }

    /// fetches a copy of every entry in the store
    pub fn get_all(&mut self) -> Result<HashMap<String, String>> {
        match self.round_trip(Request::GetAll)? {
            Response::Entries(entries) => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    /// fetches every key in the store
    pub fn get_keys(&mut self) -> Result<Vec<String>> {
        match self.round_trip(Request::GetKeys)? {
            Response::Keys(keys) => Ok(keys),
            other => Err(unexpected(other)),
        }
    }

    /// fetches every value in the store
    pub fn get_values(&mut self) -> Result<Vec<String>> {
        match self.round_trip(Request::GetValues)? {
            Response::Values(values) => Ok(values),
            other => Err(unexpected(other)),
        }
    }

    /// removes every entry from the store and clears its transaction log
    pub fn delete_all(&mut self) -> Result<()> {
        match self.round_trip(Request::DeleteAll)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    // send one request and read back one response; a server-side failure
    // arrives as Response::Err and is re-thrown here
    fn round_trip(&mut self, req: Request) -> Result<Response> {
        serde_json::to_writer(&mut self.writer, &req)?;
        self.writer.flush()?;

        match Response::deserialize(&mut self.reader)? {
            Response::Err(msg) => Err(KvdError::StringErr(msg)),
            resp => Ok(resp),
        }
    }
}

fn unexpected(resp: Response) -> KvdError {
    KvdError::StringErr(format!("unexpected response from server: {:?}", resp))
}
