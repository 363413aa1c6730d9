//! Future combinators shared by the bridge and the runtime adapters

use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::*;

pin_project! {
    /// Cancellable accepts a param `future`,
    /// abort the waiting when `cancel_future` returns.
    ///
    /// The `cancel_future` can be a timer or [Scope::cancelled](crate::scope::Scope::cancelled).
    pub struct Cancellable<F, C> {
        #[pin]
        future: F,
        #[pin]
        cancel_future: C,
    }
}

impl<F: Future, C: Future> Cancellable<F, C> {
    pub fn new(future: F, cancel_future: C) -> Self {
        Self { future, cancel_future }
    }
}

impl<F: Future, C: Future> Future for Cancellable<F, C> {
    type Output = Result<F::Output, ()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _self = self.project();
        // Polled first, so an output that is ready wins over a simultaneous cancel
        if let Poll::Ready(output) = _self.future.poll(cx) {
            return Poll::Ready(Ok(output));
        }
        if let Poll::Ready(_) = _self.cancel_future.poll(cx) {
            return Poll::Ready(Err(()));
        }
        return Poll::Pending;
    }
}
