//! A facade over a [Channel] for all call kinds.

use crate::bidi::{self, BidiStreamingCall};
use crate::client_streaming::{self, ClientStreamingCall};
use crate::server_streaming;
use crate::stream::ResponseStream;
use crate::transport::{Channel, MethodDescriptor};
use crate::unary::{self, UnaryResponse};
use callbridge_core::{CallError, CallOptions};

/// Issue calls of every kind on one channel.
///
/// ``` rust,ignore
/// let bridge = CallBridge::new(channel);
/// let reply = bridge.unary(&SAY_HELLO, "world".to_string(), CallOptions::default()).await?;
/// let mut stream = bridge.server_streaming(&LIST_FEATURES, rect, CallOptions::default())?;
/// while let Some(feature) = stream.message().await? {
///     println!("{:?}", feature);
/// }
/// ```
pub struct CallBridge<C: Channel> {
    channel: C,
}

impl<C: Channel> CallBridge<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// See [unary::call]
    #[inline]
    pub async fn unary<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, request: Req, options: CallOptions,
    ) -> Result<Resp, CallError>
    where
        Req: Send + 'static,
        Resp: Send + Unpin + 'static,
    {
        unary::call(&self.channel, method, request, options).await
    }

    /// Like [unary()](Self::unary), but the pending response can be cancelled through its
    /// [CallCanceller](crate::CallCanceller) before awaiting it.
    #[inline]
    pub fn start_unary<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, request: Req, options: CallOptions,
    ) -> Result<UnaryResponse<Req, Resp>, CallError>
    where
        Req: Send + 'static,
        Resp: Send + Unpin + 'static,
    {
        unary::start(&self.channel, method, request, options)
    }

    /// See [server_streaming::call]
    #[inline]
    pub fn server_streaming<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, request: Req, options: CallOptions,
    ) -> Result<ResponseStream<Req, Resp>, CallError>
    where
        Req: Send + 'static,
        Resp: Send + Unpin + 'static,
    {
        server_streaming::call(&self.channel, method, request, options)
    }

    /// See [client_streaming::call]
    #[inline]
    pub fn client_streaming<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, options: CallOptions,
    ) -> Result<ClientStreamingCall<Req, Resp>, CallError>
    where
        Req: Send + 'static,
        Resp: Send + Unpin + 'static,
    {
        client_streaming::call(&self.channel, method, options)
    }

    /// See [bidi::call]
    #[inline]
    pub fn bidi_streaming<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, options: CallOptions,
    ) -> Result<BidiStreamingCall<Req, Resp>, CallError>
    where
        Req: Send + 'static,
        Resp: Send + Unpin + 'static,
    {
        bidi::call(&self.channel, method, options)
    }
}

impl<C: Channel + Clone> Clone for CallBridge<C> {
    fn clone(&self) -> Self {
        Self::new(self.channel.clone())
    }
}

impl<C: Channel> std::ops::Deref for CallBridge<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.channel
    }
}
