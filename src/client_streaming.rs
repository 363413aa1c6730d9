//! Client-streaming calls: a stream of requests, one response.

use crate::call_scope::CallCanceller;
use crate::readiness::readiness;
use crate::sender::RequestSender;
use crate::transport::{Channel, MethodDescriptor, MethodType};
use crate::unary::UnaryResponse;
use callbridge_core::{CallError, CallOptions};
use std::fmt;

/// A client-streaming call in progress.
///
/// Send the requests, then await [response()](Self::response) which half-closes the request
/// side first. Use [split()](Self::split) to send and wait from different tasks.
pub struct ClientStreamingCall<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    // dropped first, so dropping the whole call cancels instead of half-closing
    response: UnaryResponse<Req, Resp>,
    sender: RequestSender<Req, Resp>,
}

impl<Req, Resp> ClientStreamingCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    /// Wait for outbound credit, then send `req`
    #[inline]
    pub async fn send(&mut self, req: Req) -> Result<(), CallError> {
        self.sender.send(req).await
    }

    /// Half-close the request stream, return false if already closed
    #[inline]
    pub fn close(&mut self) -> bool {
        self.sender.close()
    }

    #[inline]
    pub fn canceller(&self) -> CallCanceller {
        self.response.canceller()
    }

    /// Half-close if not done yet, and wait for the single response.
    pub async fn response(self) -> Result<Resp, CallError> {
        let Self { sender, response } = self;
        drop(sender);
        response.await
    }

    #[inline]
    pub fn split(self) -> (RequestSender<Req, Resp>, UnaryResponse<Req, Resp>) {
        (self.sender, self.response)
    }
}

impl<Req, Resp> fmt::Debug for ClientStreamingCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ClientStreamingCall({:?})", self.response)
    }
}

/// Issue a client-streaming call, nothing is sent until [ClientStreamingCall::send].
pub fn call<C, Req, Resp>(
    channel: &C, method: &MethodDescriptor<Req, Resp>, options: CallOptions,
) -> Result<ClientStreamingCall<Req, Resp>, CallError>
where
    C: Channel,
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    debug_assert_eq!(method.method_type(), MethodType::ClientStreaming, "{:?}", method);
    let (notifier, waiter) = readiness();
    let response = UnaryResponse::open(channel, method, &options, Some(notifier))?;
    let sender = RequestSender::new(response.call().clone(), waiter);
    Ok(ClientStreamingCall { response, sender })
}
