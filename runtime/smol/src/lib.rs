#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # callbridge-smol
//!
//! This crate provides a runtime adapter for [`callbridge`](https://docs.rs/callbridge) to work with the `smol` runtime.
//! It implements the [`AsyncRT`](https://docs.rs/callbridge-core/latest/callbridge_core/runtime/index.html) trait on top of `async-executor` and `async-io`.

use async_executor::Executor;
use async_io::Timer;
use callbridge_core::runtime::AsyncRT;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The main struct for smol, return it from `Channel::get_rt()` of your transport.
pub struct SmolRT(Option<Arc<Executor<'static>>>);

impl SmolRT {
    #[cfg(feature = "global")]
    #[inline]
    pub fn new_global() -> Self {
        Self(None)
    }

    #[inline]
    pub fn new(executor: Arc<Executor<'static>>) -> Self {
        Self(Some(executor))
    }
}

impl AsyncRT for SmolRT {
    #[inline(always)]
    fn sleep(d: Duration) -> impl Future + Send {
        Timer::after(d)
    }

    #[inline]
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        if let Some(executor) = self.0.as_ref() {
            executor.spawn(f).detach();
        } else {
            #[cfg(feature = "global")]
            {
                smol::spawn(f).detach();
                return;
            }
            // Without the global feature new_global() does not exist
            #[cfg(not(feature = "global"))]
            unreachable!();
        }
    }
}
