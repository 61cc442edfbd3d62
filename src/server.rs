use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use serde_json::Deserializer;
use tracing::{debug, error};

use crate::command::{Request, Response};
use crate::store::KvStore;
use crate::thread_pool::ThreadPool;
use crate::Result;

/// A TCP socket server over a [`KvStore`].
///
/// It listens for incoming [`Request`]s, deserializes each from the JSON
/// stream, and services the connection on a thread from the pool. Each
/// connection gets its own handle to the store; all handles share the same
/// underlying dictionary and transaction log.
pub struct KvdServer<P: ThreadPool> {
    /// the store all connections operate on
    store: KvStore,
    /// a pool of threads servicing connections
    pool: P,
}

impl<P: ThreadPool> KvdServer<P> {
    /// Create a new `KvdServer` serving the given store with the given pool.
    pub fn new(store: KvStore, pool: P) -> Self {
        KvdServer { store, pool }
    }

    /// starts the server listening on the given address.
    ///
    /// Each connection that comes in is serviced on its own pooled thread.
    /// A failed connection is logged and does not stop the accept loop.
    ///
    /// # Errors
    /// returns an IO error if the listener could not be bound
    pub fn run<A: ToSocketAddrs>(self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let store = self.store.clone();
                    self.pool.spawn(move || {
                        if let Err(e) = serve(store, stream) {
                            error!("Error on serving client: {}", e);
                        }
                    });
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
        Ok(())
    }
}

/// services one client connection: deserialize each [`Request`] from the
/// stream, execute it against the store, send back a [`Response`]
fn serve(store: KvStore, tcp: TcpStream) -> Result<()> {
    let peer_addr = tcp.peer_addr()?;
    let stream_reader = BufReader::new(&tcp);
    let mut stream_writer = BufWriter::new(&tcp);
    let req_reader = Deserializer::from_reader(stream_reader).into_iter::<Request>();

    let mut send_resp = move |resp: Response| -> Result<()> {
        serde_json::to_writer(&mut stream_writer, &resp)?;
        stream_writer.flush()?;
        debug!("Response sent to {}: {:?}", peer_addr, resp);
        Ok(())
    };

    for req in req_reader {
        let req = req?;
        debug!("Receive request from {}: {:?}", peer_addr, req);

        match req {
            Request::Get { key } => match store.get(&key) {
                Ok(value) => send_resp(Response::Value(value))?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
            Request::Set { key, value } => match store.set(key, value) {
                Ok(()) => send_resp(Response::Ok)?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
            Request::Delete { key } => match store.delete(&key) {
                Ok(previous) => send_resp(Response::Value(previous))?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
            Request::GetAll => match store.get_all() {
                Ok(entries) => send_resp(Response::Entries(entries))?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
            Request::GetKeys => match store.get_keys() {
                Ok(keys) => send_resp(Response::Keys(keys))?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
            Request::GetValues => match store.get_values() {
                Ok(values) => send_resp(Response::Values(values))?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
            Request::DeleteAll => match store.delete_all() {
                Ok(()) => send_resp(Response::Ok)?,
                Err(e) => send_resp(Response::Err(format!("{}", e)))?,
            },
        };
    }
    Ok(())
}
