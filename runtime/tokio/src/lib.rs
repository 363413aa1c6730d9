#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # callbridge-tokio
//!
//! This crate provides a runtime adapter for [`callbridge`](https://docs.rs/callbridge) to work with the `tokio` runtime.
//! It implements the [`AsyncRT`](https://docs.rs/callbridge-core/latest/callbridge_core/runtime/index.html) trait to support `tokio`.
//!
use callbridge_core::runtime::AsyncRT;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;

/// The main struct for tokio runtime, return it from `Channel::get_rt()` of your transport.
pub struct TokioRT(Handle);

impl TokioRT {
    /// Capture a tokio runtime handle to ensure background task can spawn
    #[inline]
    pub fn new(handle: Handle) -> Self {
        Self(handle)
    }

    /// Capture the handle of the runtime we are running on.
    ///
    /// Panics when called outside of a tokio runtime, same as `Handle::current()`.
    #[inline]
    pub fn current() -> Self {
        Self(Handle::current())
    }
}

impl AsyncRT for TokioRT {
    #[inline(always)]
    fn sleep(d: Duration) -> impl Future + Send {
        tokio::time::sleep(d)
    }

    /// spawn background coroutine with captured runtime handle
    #[inline]
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.0.spawn(f);
    }
}
