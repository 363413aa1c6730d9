//! The request side of streaming calls.

use crate::call_scope::{CallCanceller, CallScope, CancelSource};
use crate::readiness::ReadyWaiter;
use callbridge_core::CallError;
use std::fmt;
use std::sync::Arc;

/// The request side of a client-streaming or bidi-streaming call.
///
/// [send()](RequestSender::send) waits while the transport has no outbound credit. Dropping the
/// sender half-closes the request stream.
pub struct RequestSender<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    call: Arc<CallScope<Req, Resp>>,
    ready: ReadyWaiter,
}

impl<Req, Resp> RequestSender<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    pub(crate) fn new(call: Arc<CallScope<Req, Resp>>, ready: ReadyWaiter) -> Self {
        Self { call, ready }
    }

    /// Send one request once the transport is ready for it.
    ///
    /// Fails with [CallError::StreamClosed] after [close()](Self::close). Once the call
    /// terminated, fails with the error the call terminated with.
    pub async fn send(&mut self, req: Req) -> Result<(), CallError> {
        loop {
            if self.call.is_half_closed() {
                return Err(CallError::StreamClosed);
            }
            if !self.call.is_active() {
                return Err(self.call.terminal_error());
            }
            if self.call.is_ready() {
                break;
            }
            logger_trace!(self.call.logger(), "{:?} wait for outbound credit", self.call);
            if !self.ready.wait().await {
                return Err(self.call.terminal_error());
            }
        }
        self.call.send_message(req)
    }

    /// Half-close the request stream, return false if it was already closed.
    #[inline]
    pub fn close(&mut self) -> bool {
        self.call.half_close()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.call.is_half_closed()
    }

    /// Cancel the whole call, responses included
    #[inline]
    pub fn cancel(&self, cause: impl Into<String>) -> bool {
        self.call.cancel(CancelSource::Local(cause.into()))
    }

    #[inline]
    pub fn canceller(&self) -> CallCanceller {
        CallCanceller::new(&self.call)
    }
}

impl<Req, Resp> Drop for RequestSender<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn drop(&mut self) {
        self.call.half_close();
    }
}

impl<Req, Resp> fmt::Debug for RequestSender<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RequestSender({:?}, closed={})", self.call, self.call.is_half_closed())
    }
}
