//! Thread pools used by [`KvdServer`] to service client connections.
//!
//! [`KvdServer`]: crate::KvdServer

use crate::Result;

/// A pool of threads that jobs can be spawned onto.
pub trait ThreadPool {
    /// creates a new pool with the given number of `threads`
    ///
    /// # Errors
    /// returns an error if any thread could not be started
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// Spawns a function into the thread pool.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

mod rayon_pool;
mod shared_queue;

pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;
