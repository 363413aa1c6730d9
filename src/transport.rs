//! Traits for the transport side of a call.
//!
//! The transport owns connections, framing and serialization. The bridge only needs to open a
//! call, drive it (`request`, `send_message`, `half_close`, `cancel`) and be notified through a
//! [CallListener] from whatever thread the transport runs its callbacks on.

use callbridge_core::runtime::AsyncRT;
use callbridge_core::{CallOptions, Metadata, Status};
use captains_log::filter::LogFilter;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodType {
    /// One request, one response
    Unary,
    /// One request, many responses
    ServerStreaming,
    /// Many requests, one response
    ClientStreaming,
    /// Many requests and many responses, independently lifecycled
    BidiStreaming,
}

/// Describes a remote method, typed with its request and response message.
///
/// ``` rust
/// use callbridge::{MethodDescriptor, MethodType};
///
/// const SAY_HELLO: MethodDescriptor<String, String> =
///     MethodDescriptor::new("helloworld.Greeter/SayHello", MethodType::Unary);
/// assert_eq!(SAY_HELLO.service_name(), "helloworld.Greeter");
/// assert_eq!(SAY_HELLO.method_name(), "SayHello");
/// ```
pub struct MethodDescriptor<Req, Resp> {
    full_name: &'static str,
    method_type: MethodType,
    _phan: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> MethodDescriptor<Req, Resp> {
    /// `full_name` is in "package.Service/Method" format
    pub const fn new(full_name: &'static str, method_type: MethodType) -> Self {
        Self { full_name, method_type, _phan: PhantomData }
    }

    #[inline(always)]
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    #[inline(always)]
    pub fn method_type(&self) -> MethodType {
        self.method_type
    }

    #[inline]
    pub fn service_name(&self) -> &'static str {
        match self.full_name.rfind('/') {
            Some(pos) => &self.full_name[..pos],
            None => "",
        }
    }

    #[inline]
    pub fn method_name(&self) -> &'static str {
        match self.full_name.rfind('/') {
            Some(pos) => &self.full_name[pos + 1..],
            None => self.full_name,
        }
    }
}

impl<Req, Resp> Clone for MethodDescriptor<Req, Resp> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Resp> Copy for MethodDescriptor<Req, Resp> {}

impl<Req, Resp> fmt::Debug for MethodDescriptor<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({:?})", self.full_name, self.method_type)
    }
}

/// Notifications from the transport about one call.
///
/// The transport may invoke these from any thread, but must not invoke them concurrently for
/// the same call. `on_close` is the last notification and happens exactly once.
pub trait CallListener<Resp>: Send + Sync + 'static {
    /// A response message arrived, only delivered within the credit granted by `request()`
    fn on_message(&self, msg: Resp);

    /// The call became ready to accept more outbound messages
    fn on_ready(&self);

    /// The call reached its end, either completed (ok status) or failed
    fn on_close(&self, status: Status);
}

/// One call opened on the transport.
pub trait ClientCall<Req, Resp>: Send + Sync + 'static {
    /// Begin the call, the listener will receive all notifications
    fn start(&self, listener: Arc<dyn CallListener<Resp>>, metadata: Metadata);

    /// Grant credit for `n` more inbound messages
    fn request(&self, n: usize);

    fn send_message(&self, msg: Req);

    /// No more requests will be sent
    fn half_close(&self);

    /// Abort the call. The transport should still close the listener, usually with a
    /// cancelled status.
    fn cancel(&self, reason: &str, cause: Option<&str>);

    /// Whether the outbound side has credit, sends are held back while it returns false.
    ///
    /// When it flips back to true the transport must call [CallListener::on_ready].
    #[inline]
    fn is_ready(&self) -> bool {
        true
    }
}

/// A trait implemented by the transport, to open calls.
pub trait Channel: Send + Sync + 'static {
    type RT: AsyncRT;

    /// The runtime the bridge spawns its scope watchers on
    fn get_rt(&self) -> &Self::RT;

    /// Construct a [captains_log::filter::LogFilter](https://docs.rs/captains-log/latest/captains_log/filter/trait.Filter.html) to organize log of calls
    fn new_logger(&self) -> Arc<LogFilter>;

    fn new_call<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, options: &CallOptions,
    ) -> Result<Arc<dyn ClientCall<Req, Resp>>, Status>
    where
        Req: Send + 'static,
        Resp: Send + 'static;
}

impl<C: Channel> Channel for Arc<C> {
    type RT = C::RT;

    #[inline(always)]
    fn get_rt(&self) -> &Self::RT {
        self.as_ref().get_rt()
    }

    #[inline(always)]
    fn new_logger(&self) -> Arc<LogFilter> {
        self.as_ref().new_logger()
    }

    #[inline(always)]
    fn new_call<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, options: &CallOptions,
    ) -> Result<Arc<dyn ClientCall<Req, Resp>>, Status>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        self.as_ref().new_call(method, options)
    }
}
