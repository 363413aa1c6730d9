//! The consumer side of the response pipeline, with inbound flow control.

use crate::buffer::{BufferReceiver, Inbound};
use crate::call_scope::{CLIENT_CANCELLED, CallCanceller, CallScope, CancelSource};
use crate::observer::protocol_violation;
use callbridge_core::CallError;
use futures::stream::{FusedStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// The response messages of a server-streaming or bidi-streaming call.
///
/// Yields messages in arrival order. A failed call yields one `Err` after the messages received
/// before the failure, then the stream ends. A completed call just ends.
///
/// Credit for one more message is granted to the transport each time the consumer comes back
/// for the next item, so the transport never runs ahead of the consumer by more than the
/// initial credit.
///
/// Dropping the stream before it ended cancels the call.
pub struct ResponseStream<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    call: Arc<CallScope<Req, Resp>>,
    rx: BufferReceiver<Resp>,
    owe_credit: bool,
    finished: bool,
}

// No field is structurally pinned
impl<Req, Resp> Unpin for ResponseStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{}

impl<Req, Resp> ResponseStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    pub(crate) fn new(call: Arc<CallScope<Req, Resp>>, rx: BufferReceiver<Resp>) -> Self {
        Self { call, rx, owe_credit: false, finished: false }
    }

    /// Receive the next message, Ok(None) when the call completed.
    #[inline]
    pub async fn message(&mut self) -> Result<Option<Resp>, CallError> {
        match self.next().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    #[inline]
    pub fn canceller(&self) -> CallCanceller {
        CallCanceller::new(&self.call)
    }

    /// Messages received but not yet taken by the consumer
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.rx.len()
    }
}

impl<Req, Resp> Stream for ResponseStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    type Item = Result<Resp, CallError>;

    fn poll_next(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Option<Self::Item>> {
        let _self = self.get_mut();
        if _self.finished {
            return Poll::Ready(None);
        }
        if _self.owe_credit {
            // the consumer is done with the previous message
            _self.owe_credit = false;
            _self.call.request(1);
        }
        match _self.rx.poll_item(ctx) {
            Poll::Ready(Some(Inbound::Message(msg))) => {
                _self.owe_credit = true;
                return Poll::Ready(Some(Ok(msg)));
            }
            Poll::Ready(Some(Inbound::End(Ok(())))) => {
                _self.finished = true;
                return Poll::Ready(None);
            }
            Poll::Ready(Some(Inbound::End(Err(e)))) => {
                _self.finished = true;
                return Poll::Ready(Some(Err(e)));
            }
            Poll::Ready(None) => {
                _self.finished = true;
                protocol_violation!(_self.call.logger(), "{:?} buffer closed without end", _self.call);
            }
            Poll::Pending => return Poll::Pending,
        }
    }
}

impl<Req, Resp> FusedStream for ResponseStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    #[inline]
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<Req, Resp> Drop for ResponseStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn drop(&mut self) {
        if !self.finished {
            self.call.cancel(CancelSource::Local(CLIENT_CANCELLED.to_string()));
        }
    }
}

impl<Req, Resp> fmt::Debug for ResponseStream<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ResponseStream({:?}, finished={})", self.call, self.finished)
    }
}
