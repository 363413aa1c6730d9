//! An in-memory transport, delivering callbacks from its own threads like a network stack
//! would.

use crate::{RT, new_rt};
use callbridge::{
    CallListener, CallOptions, Channel, ClientCall, Metadata, MethodDescriptor, MethodType, Status,
};
use captains_log::filter::LogFilter;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub struct MockChannel {
    rt: RT,
    calls: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
    open_error: Mutex<Option<Status>>,
    /// Whether a cancelled call is closed with a cancelled status, as real transports do
    echo_cancel: bool,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rt: new_rt(),
            calls: Mutex::new(Vec::new()),
            open_error: Mutex::new(None),
            echo_cancel: true,
        })
    }

    pub fn without_cancel_echo() -> Arc<Self> {
        Arc::new(Self {
            rt: new_rt(),
            calls: Mutex::new(Vec::new()),
            open_error: Mutex::new(None),
            echo_cancel: false,
        })
    }

    /// The next `new_call` fails with `status`
    pub fn fail_next_open(&self, status: Status) {
        self.open_error.lock().unwrap().replace(status);
    }

    pub fn calls_opened(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call<Req, Resp>(&self) -> Arc<MockCall<Req, Resp>>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        let call = self.calls.lock().unwrap().last().expect("no call opened").clone();
        call.downcast::<MockCall<Req, Resp>>().expect("message types")
    }
}

impl Channel for MockChannel {
    type RT = RT;

    fn get_rt(&self) -> &RT {
        &self.rt
    }

    fn new_logger(&self) -> Arc<LogFilter> {
        Arc::new(LogFilter::new())
    }

    fn new_call<Req, Resp>(
        &self, method: &MethodDescriptor<Req, Resp>, _options: &CallOptions,
    ) -> Result<Arc<dyn ClientCall<Req, Resp>>, Status>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        if let Some(status) = self.open_error.lock().unwrap().take() {
            return Err(status);
        }
        let call = Arc::new(MockCall::<Req, Resp>::new(method.full_name(), self.echo_cancel));
        self.calls.lock().unwrap().push(call.clone());
        Ok(call)
    }
}

pub struct MockCall<Req, Resp> {
    pub method: &'static str,
    listener: Mutex<Option<Arc<dyn CallListener<Resp>>>>,
    /// Serialize callbacks, the listener must never see two at once
    callback_lock: Mutex<()>,
    closed: AtomicBool,
    ready: AtomicBool,
    echo_cancel: bool,
    delivered: AtomicUsize,
    pub metadata: Mutex<Option<Metadata>>,
    pub requested: AtomicUsize,
    pub sent: Mutex<Vec<Req>>,
    pub half_closes: AtomicUsize,
    pub cancels: Mutex<Vec<(String, Option<String>)>>,
}

impl<Req, Resp> MockCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn new(method: &'static str, echo_cancel: bool) -> Self {
        Self {
            method,
            listener: Mutex::new(None),
            callback_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            ready: AtomicBool::new(true),
            echo_cancel,
            delivered: AtomicUsize::new(0),
            metadata: Mutex::new(None),
            requested: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            half_closes: AtomicUsize::new(0),
            cancels: Mutex::new(Vec::new()),
        }
    }

    fn listener(&self) -> Option<Arc<dyn CallListener<Resp>>> {
        self.listener.lock().unwrap().clone()
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn requested(&self) -> usize {
        self.requested.load(Ordering::Acquire)
    }

    #[inline]
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Acquire)
    }

    #[inline]
    pub fn half_closes(&self) -> usize {
        self.half_closes.load(Ordering::Acquire)
    }

    pub fn cancels(&self) -> Vec<(String, Option<String>)> {
        self.cancels.lock().unwrap().clone()
    }

    /// Deliver a message regardless of credit
    pub fn emit(&self, msg: Resp) {
        let _guard = self.callback_lock.lock().unwrap();
        if self.is_closed() {
            return;
        }
        if let Some(listener) = self.listener() {
            self.delivered.fetch_add(1, Ordering::AcqRel);
            listener.on_message(msg);
        }
    }

    /// Return false if the call was already closed
    pub fn close(&self, status: Status) -> bool {
        let _guard = self.callback_lock.lock().unwrap();
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(listener) = self.listener() {
            listener.on_close(status);
        }
        true
    }

    pub fn set_ready(&self, ready: bool) {
        let _guard = self.callback_lock.lock().unwrap();
        if !self.ready.swap(ready, Ordering::AcqRel) && ready {
            if let Some(listener) = self.listener() {
                listener.on_ready();
            }
        }
    }

    /// Like a server on the other end: deliver `msgs` within the granted credit from a worker
    /// thread, then close with `status`. Stops when the call is closed by a cancel.
    pub fn serve(self: &Arc<Self>, msgs: Vec<Resp>, status: Status) -> thread::JoinHandle<()> {
        let call = self.clone();
        thread::spawn(move || {
            for msg in msgs {
                loop {
                    if call.is_closed() {
                        return;
                    }
                    if call.delivered() < call.requested() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                call.emit(msg);
            }
            call.close(status);
        })
    }
}

impl<Req, Resp> ClientCall<Req, Resp> for MockCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn start(&self, listener: Arc<dyn CallListener<Resp>>, metadata: Metadata) {
        self.metadata.lock().unwrap().replace(metadata);
        let prev = self.listener.lock().unwrap().replace(listener);
        assert!(prev.is_none(), "{} started twice", self.method);
    }

    fn request(&self, n: usize) {
        self.requested.fetch_add(n, Ordering::AcqRel);
    }

    fn send_message(&self, msg: Req) {
        assert!(self.is_started(), "{} send before start", self.method);
        assert_eq!(self.half_closes(), 0, "{} send after half close", self.method);
        self.sent.lock().unwrap().push(msg);
    }

    fn half_close(&self) {
        self.half_closes.fetch_add(1, Ordering::AcqRel);
    }

    fn cancel(&self, reason: &str, cause: Option<&str>) {
        self.cancels.lock().unwrap().push((reason.to_string(), cause.map(|s| s.to_string())));
        if !self.echo_cancel {
            return;
        }
        // the transport reports the cancellation later from its own thread
        let listener = self.listener();
        let reason = reason.to_string();
        let closed = self.closed.swap(true, Ordering::AcqRel);
        if let (Some(listener), false) = (listener, closed) {
            thread::spawn(move || {
                listener.on_close(Status::cancelled(reason));
            });
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

pub const SAY_HELLO: MethodDescriptor<String, String> =
    MethodDescriptor::new("helloworld.Greeter/SayHello", MethodType::Unary);
pub const LIST_FEATURES: MethodDescriptor<String, String> =
    MethodDescriptor::new("routeguide.RouteGuide/ListFeatures", MethodType::ServerStreaming);
pub const RECORD_ROUTE: MethodDescriptor<String, usize> =
    MethodDescriptor::new("routeguide.RouteGuide/RecordRoute", MethodType::ClientStreaming);
pub const ROUTE_CHAT: MethodDescriptor<String, String> =
    MethodDescriptor::new("routeguide.RouteGuide/RouteChat", MethodType::BidiStreaming);
