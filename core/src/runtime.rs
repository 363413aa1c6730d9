//! The runtime model defines interface to adapt various async runtimes.
//!
//! The adaptor are provided as sub-crates:
//!
//! - [callbridge-tokio](https://docs.rs/callbridge-tokio)
//!
//! - [callbridge-smol](https://docs.rs/callbridge-smol)
//!
//! The bridge only needs to spawn a detached watcher per call and to sleep, so the trait stays
//! small. Everything else (I/O, connections) belongs to the transport.

use crate::future::Cancellable;
use std::future::Future;
use std::time::Duration;

/// Defines the interface we used from async runtime
///
/// See module level doc: [crate::runtime]
pub trait AsyncRT: Send + Sync + 'static {
    fn sleep(d: Duration) -> impl Future + Send;

    #[inline]
    fn timeout<F>(d: Duration, func: F) -> impl Future<Output = Result<F::Output, ()>> + Send
    where
        F: Future + Send,
    {
        Cancellable::new(func, Self::sleep(d))
    }

    /// Spawn background coroutine, the handle is not kept
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static;
}
