//! Unary calls: one request, exactly one response.

use crate::call_scope::{CLIENT_CANCELLED, CallCanceller, CallScope, CancelSource};
use crate::observer::{ObserverSink, protocol_violation};
use crate::readiness::ReadyNotifier;
use crate::transport::{Channel, MethodDescriptor};
use callbridge_core::{CallError, CallOptions, Status};
use crossfire::Tx;
use crossfire::stream::AsyncStream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

/// Keeps the single response until the call closes, then resolves the waiter once.
pub(crate) struct UnarySlot<Resp> {
    resp: Mutex<Option<Resp>>,
    done: Mutex<Option<Tx<Result<Resp, CallError>>>>,
}

impl<Resp: Send + Unpin + 'static> UnarySlot<Resp> {
    pub fn new() -> (Self, AsyncStream<Result<Resp, CallError>>) {
        let (tx, rx) = crossfire::spsc::bounded_tx_blocking_rx_async::<Result<Resp, CallError>>(1);
        (Self { resp: Mutex::new(None), done: Mutex::new(Some(tx)) }, rx.into_stream())
    }
}

impl<Resp: Send + Unpin + 'static> ObserverSink<Resp> for UnarySlot<Resp> {
    fn push_message(&self, msg: Resp) -> Result<(), Status> {
        let mut guard = self.resp.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Err(Status::internal("too many responses"));
        }
        guard.replace(msg);
        Ok(())
    }

    fn push_end(&self, outcome: Result<(), CallError>) {
        let tx = self.done.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = tx {
            let res = match outcome {
                Ok(()) => match self.resp.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    Some(resp) => Ok(resp),
                    None => Err(CallError::Transport(Status::internal("no response received"))),
                },
                Err(e) => Err(e),
            };
            // capacity is 1 and this is the only send, never blocks
            let _ = tx.send(res);
        }
    }
}

/// The pending outcome of a unary or client-streaming call.
///
/// Resolves exactly once. Dropping it before it resolved cancels the call.
pub struct UnaryResponse<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    call: Arc<CallScope<Req, Resp>>,
    rx: AsyncStream<Result<Resp, CallError>>,
    done: bool,
}

// No field is structurally pinned
impl<Req, Resp> Unpin for UnaryResponse<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{}

impl<Req, Resp> UnaryResponse<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    /// Open a call whose responses go to a single slot, with credit for the response and
    /// one extra, to detect a server sending too many.
    pub(crate) fn open<C: Channel>(
        channel: &C, method: &MethodDescriptor<Req, Resp>, options: &CallOptions,
        ready: Option<ReadyNotifier>,
    ) -> Result<Self, CallError> {
        let (slot, rx) = UnarySlot::new();
        let call = CallScope::open(channel, method, options, Box::new(slot), ready)?;
        call.request(2);
        Ok(Self { call, rx, done: false })
    }

    pub(crate) fn call(&self) -> &Arc<CallScope<Req, Resp>> {
        &self.call
    }

    #[inline]
    pub fn canceller(&self) -> CallCanceller {
        CallCanceller::new(&self.call)
    }
}

impl<Req, Resp> Future for UnaryResponse<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    type Output = Result<Resp, CallError>;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Self::Output> {
        let _self = self.get_mut();
        if _self.done {
            return Poll::Ready(Err(CallError::StreamClosed));
        }
        match _self.rx.poll_item(ctx) {
            Poll::Ready(Some(res)) => {
                _self.done = true;
                return Poll::Ready(res);
            }
            Poll::Ready(None) => {
                _self.done = true;
                protocol_violation!(_self.call.logger(), "{:?} slot closed without outcome", _self.call);
            }
            Poll::Pending => return Poll::Pending,
        }
    }
}

impl<Req, Resp> Drop for UnaryResponse<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn drop(&mut self) {
        if !self.done {
            self.call.cancel(CancelSource::Local(CLIENT_CANCELLED.to_string()));
        }
    }
}

impl<Req, Resp> fmt::Debug for UnaryResponse<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UnaryResponse({:?}, done={})", self.call, self.done)
    }
}

/// Issue a unary call, the request is sent and the request side half-closed right away.
///
/// The returned future resolves with the single response, or the failure of the call.
pub fn start<C, Req, Resp>(
    channel: &C, method: &MethodDescriptor<Req, Resp>, request: Req, options: CallOptions,
) -> Result<UnaryResponse<Req, Resp>, CallError>
where
    C: Channel,
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    debug_assert_eq!(method.method_type(), crate::MethodType::Unary, "{:?}", method);
    let resp = UnaryResponse::open(channel, method, &options, None)?;
    let call = resp.call();
    // a call terminated during start reports its outcome through `resp`
    if call.send_message(request).is_ok() {
        call.half_close();
    }
    Ok(resp)
}

/// Issue a unary call and wait for its response.
#[inline]
pub async fn call<C, Req, Resp>(
    channel: &C, method: &MethodDescriptor<Req, Resp>, request: Req, options: CallOptions,
) -> Result<Resp, CallError>
where
    C: Channel,
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    start(channel, method, request, options)?.await
}
