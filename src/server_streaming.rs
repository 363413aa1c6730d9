//! Server-streaming calls: one request, a stream of responses.

use crate::buffer::MessageBuffer;
use crate::call_scope::CallScope;
use crate::stream::ResponseStream;
use crate::transport::{Channel, MethodDescriptor, MethodType};
use callbridge_core::{CallError, CallOptions};

/// Issue a server-streaming call.
///
/// The request is sent and the request side half-closed immediately. Only
/// [CallOptions::initial_credit] messages are requested up front, further ones as the returned
/// stream is consumed.
pub fn call<C, Req, Resp>(
    channel: &C, method: &MethodDescriptor<Req, Resp>, request: Req, options: CallOptions,
) -> Result<ResponseStream<Req, Resp>, CallError>
where
    C: Channel,
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    debug_assert_eq!(method.method_type(), MethodType::ServerStreaming, "{:?}", method);
    let (buffer, rx) = MessageBuffer::new(options.buffer_limit);
    let call = CallScope::open(channel, method, &options, Box::new(buffer), None)?;
    call.request(options.effective_initial_credit());
    // a call terminated during start reports its outcome through the stream
    if call.send_message(request).is_ok() {
        call.half_close();
    }
    Ok(ResponseStream::new(call, rx))
}
