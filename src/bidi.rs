//! Bidi-streaming calls: requests and responses flow independently.

use crate::buffer::MessageBuffer;
use crate::call_scope::{CallCanceller, CallScope};
use crate::readiness::readiness;
use crate::sender::RequestSender;
use crate::stream::ResponseStream;
use crate::transport::{Channel, MethodDescriptor, MethodType};
use callbridge_core::{CallError, CallOptions};
use std::fmt;

/// A bidi-streaming call in progress.
///
/// Closing the request side does not end the responses, the call ends when the transport
/// closes it or it is cancelled. [split()](Self::split) gives the two halves to different
/// tasks.
pub struct BidiStreamingCall<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    // dropped first, so dropping the whole call cancels instead of half-closing
    responses: ResponseStream<Req, Resp>,
    sender: RequestSender<Req, Resp>,
}

impl<Req, Resp> BidiStreamingCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    #[inline]
    pub async fn send(&mut self, req: Req) -> Result<(), CallError> {
        self.sender.send(req).await
    }

    #[inline]
    pub fn close(&mut self) -> bool {
        self.sender.close()
    }

    /// Next response, Ok(None) once the call completed
    #[inline]
    pub async fn message(&mut self) -> Result<Option<Resp>, CallError> {
        self.responses.message().await
    }

    #[inline]
    pub fn canceller(&self) -> CallCanceller {
        self.responses.canceller()
    }

    #[inline]
    pub fn split(self) -> (RequestSender<Req, Resp>, ResponseStream<Req, Resp>) {
        (self.sender, self.responses)
    }
}

impl<Req, Resp> fmt::Debug for BidiStreamingCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BidiStreamingCall({:?})", self.responses)
    }
}

/// Issue a bidi-streaming call, the first [CallOptions::initial_credit] responses are requested
/// right away.
pub fn call<C, Req, Resp>(
    channel: &C, method: &MethodDescriptor<Req, Resp>, options: CallOptions,
) -> Result<BidiStreamingCall<Req, Resp>, CallError>
where
    C: Channel,
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    debug_assert_eq!(method.method_type(), MethodType::BidiStreaming, "{:?}", method);
    let (notifier, waiter) = readiness();
    let (buffer, rx) = MessageBuffer::new(options.buffer_limit);
    let call = CallScope::open(channel, method, &options, Box::new(buffer), Some(notifier))?;
    call.request(options.effective_initial_credit());
    let sender = RequestSender::new(call.clone(), waiter);
    Ok(BidiStreamingCall { responses: ResponseStream::new(call, rx), sender })
}
