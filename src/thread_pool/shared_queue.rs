use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error};

use super::ThreadPool;
use crate::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool backed by a shared job queue (a crossbeam MPMC channel
/// used single-producer, multiple-consumer: the pool sends, the worker
/// threads receive).
///
/// A worker that panics while running a job is replaced with a fresh
/// thread, so a panicking job does not shrink the pool. If replacing a
/// worker fails at the OS level the pool shrinks silently; spawning onto a
/// pool whose last worker is gone will panic.
pub struct SharedQueueThreadPool {
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {
    /// create a new pool with the given number of `threads`, each holding
    /// the receiving end of the shared queue
    fn new(threads: u32) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        for _ in 0..threads {
            let worker = Worker(rx.clone());
            thread::Builder::new().spawn(move || worker.run())?;
        }
        Ok(SharedQueueThreadPool { tx })
    }

    /// Spawns a function into the thread pool.
    ///
    /// # Panics
    /// Panics if the thread pool has no threads left.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .expect("There are no threads in the pool");
    }
}

// receives jobs off the shared queue and runs them; replaces itself with a
// new thread when a job panics
#[derive(Clone)]
struct Worker(Receiver<Job>);

impl Worker {
    fn run(&self) {
        loop {
            match self.0.recv() {
                Ok(job) => job(),
                Err(_) => {
                    debug!("worker exiting, the thread pool was destroyed");
                    break;
                }
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("worker panicked, starting a replacement thread");
            let worker = self.clone();
            if let Err(e) = thread::Builder::new().spawn(move || worker.run()) {
                error!("Failed to spawn a replacement thread: {}", e);
            }
        }
    }
}
