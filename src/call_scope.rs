//! One in-flight call, bound to a cancellation scope.
//!
//! [CallScope] owns the transport call and the adapter receiving its callbacks. It is opened in a
//! child of the scope from [CallOptions], and a detached watcher cancels the call when that
//! scope is cancelled. The watcher and the adapter only hold weak references, so dropping the
//! application handles is enough to tear the call down.

use crate::observer::{CallState, ObserverSink, ResponseObserverAdapter};
use crate::readiness::ReadyNotifier;
use crate::transport::{Channel, ClientCall, MethodDescriptor};
use callbridge_core::runtime::AsyncRT;
use callbridge_core::{CallError, CallOptions, Scope, Status};
use captains_log::filter::LogFilter;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) const CLIENT_CANCELLED: &str = "client cancelled";

pub(crate) enum CancelSource {
    /// Through a handle of this call, or its handles dropped early
    Local(String),
    /// The enclosing scope was cancelled
    Scope,
}

pub(crate) struct CallScope<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    id: u64,
    method: &'static str,
    call: Arc<dyn ClientCall<Req, Resp>>,
    adapter: Arc<ResponseObserverAdapter<Req, Resp>>,
    scope: Scope,
    half_closed: AtomicBool,
    logger: Arc<LogFilter>,
}

impl<Req, Resp> CallScope<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    /// Open the call on the transport and start it, unless the scope is already cancelled.
    pub fn open<C: Channel>(
        channel: &C, method: &MethodDescriptor<Req, Resp>, options: &CallOptions,
        sink: Box<dyn ObserverSink<Resp>>, ready: Option<ReadyNotifier>,
    ) -> Result<Arc<Self>, CallError> {
        let logger = channel.new_logger();
        let scope = match options.scope.as_ref() {
            Some(parent) => parent.child(),
            None => Scope::new(),
        };
        let call = match channel.new_call(method, options) {
            Ok(call) => call,
            Err(status) => {
                logger_warn!(logger, "open {} failed: {}", method.full_name(), status);
                return Err(CallError::Transport(status));
            }
        };
        let id = NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let full_name = method.full_name();
        let this = Arc::new_cyclic(|weak: &Weak<Self>| {
            let adapter = ResponseObserverAdapter::new(
                id,
                full_name,
                weak.clone(),
                sink,
                ready,
                scope.clone(),
                logger.clone(),
            );
            Self {
                id,
                method: full_name,
                call,
                adapter: Arc::new(adapter),
                scope,
                half_closed: AtomicBool::new(false),
                logger,
            }
        });
        if this.scope.is_cancelled() {
            logger_debug!(this.logger, "{:?} scope cancelled before start", this);
            this.cancel(CancelSource::Scope);
            return Ok(this);
        }
        this.call.start(this.adapter.clone(), options.metadata.clone());
        logger_debug!(this.logger, "{:?} started", this);

        let weak = Arc::downgrade(&this);
        let scope = this.scope.clone();
        channel.get_rt().spawn_detach(async move {
            scope.cancelled().await;
            if let Some(call) = weak.upgrade() {
                call.cancel(CancelSource::Scope);
            }
        });
        Ok(this)
    }
}

impl<Req, Resp> CallScope<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    #[inline(always)]
    pub fn state(&self) -> CallState {
        self.adapter.state()
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        !self.adapter.state().is_terminal()
    }

    #[inline(always)]
    pub fn logger(&self) -> &LogFilter {
        &self.logger
    }

    /// The error a send reports once the call terminated
    pub fn terminal_error(&self) -> CallError {
        match self.adapter.failure() {
            Some(e) => e.clone(),
            None => CallError::StreamClosed,
        }
    }

    /// Cancel the call if still active, return false when it already terminated.
    ///
    /// The transport call is cancelled before the outcome is published, whatever it reports
    /// afterwards is ignored.
    pub fn cancel(&self, source: CancelSource) -> bool {
        let (error, reason, cause) = match source {
            CancelSource::Local(cause) => {
                (CallError::Cancelled(cause.clone()), CLIENT_CANCELLED, Some(cause))
            }
            CancelSource::Scope => (CallError::ScopeCancelled, "call cancelled", self.scope.cause()),
        };
        let r = self.adapter.terminate_with(CallState::Cancelled, Err(error), || {
            logger_debug!(self.logger, "{:?} {} (cause {:?})", self, reason, cause);
            self.call.cancel(reason, cause.as_deref());
        });
        if let Err(prev) = r {
            logger_trace!(self.logger, "{:?} skip cancel, already {:?}", self, prev);
            return false;
        }
        true
    }

    /// Terminate the call with a failure raised on the bridge side
    pub fn fail(&self, status: Status) -> bool {
        let message = status.message().to_string();
        let r = self.adapter.terminate_with(CallState::Cancelled, Err(status.into()), || {
            logger_warn!(self.logger, "{:?} failed: {}", self, message);
            self.call.cancel(&message, None);
        });
        if let Err(prev) = r {
            logger_trace!(self.logger, "{:?} skip fail, already {:?}", self, prev);
            return false;
        }
        true
    }

    /// Grant inbound credit, no-op once terminated
    #[inline]
    pub fn request(&self, n: usize) {
        if self.is_active() {
            logger_trace!(self.logger, "{:?} request {}", self, n);
            self.call.request(n);
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.call.is_ready()
    }

    pub fn send_message(&self, msg: Req) -> Result<(), CallError> {
        if self.is_half_closed() {
            return Err(CallError::StreamClosed);
        }
        if !self.is_active() {
            return Err(self.terminal_error());
        }
        self.call.send_message(msg);
        Ok(())
    }

    #[inline(always)]
    pub fn is_half_closed(&self) -> bool {
        self.half_closed.load(Ordering::Acquire)
    }

    /// Return false if already half-closed. The transport is left alone once the call
    /// terminated.
    pub fn half_close(&self) -> bool {
        if self.half_closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.is_active() {
            logger_trace!(self.logger, "{:?} half close", self);
            self.call.half_close();
        }
        true
    }
}

impl<Req, Resp> Drop for CallScope<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn drop(&mut self) {
        // handles normally cancel before letting go, this covers the rest
        let outcome = Err(CallError::Cancelled(CLIENT_CANCELLED.to_string()));
        let _ = self.adapter.terminate_with(CallState::Cancelled, outcome, || {
            logger_debug!(self.logger, "{:?} dropped while active", self);
            self.call.cancel(CLIENT_CANCELLED, Some(CLIENT_CANCELLED));
        });
    }
}

impl<Req, Resp> fmt::Debug for CallScope<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "call#{}({})", self.id, self.method)
    }
}

/// The part of a call a [CallCanceller] needs, without its message types
pub(crate) trait CancelCall: Send + Sync {
    fn cancel_local(&self, cause: String) -> bool;

    fn state(&self) -> CallState;
}

impl<Req, Resp> CancelCall for CallScope<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    #[inline]
    fn cancel_local(&self, cause: String) -> bool {
        self.cancel(CancelSource::Local(cause))
    }

    #[inline]
    fn state(&self) -> CallState {
        CallScope::state(self)
    }
}

/// A cloneable handle to cancel a call from anywhere.
///
/// It does not keep the call alive, cancelling a call that already ended is a no-op.
#[derive(Clone)]
pub struct CallCanceller {
    call: Weak<dyn CancelCall>,
}

impl CallCanceller {
    pub(crate) fn new<Req, Resp>(call: &Arc<CallScope<Req, Resp>>) -> Self
    where
        Req: Send + 'static,
        Resp: Send + Unpin + 'static,
    {
        let weak: Weak<CallScope<Req, Resp>> = Arc::downgrade(call);
        Self { call: weak }
    }

    /// Cancel the call, it terminates with [CallError::Cancelled] carrying `cause`.
    ///
    /// Return true if this was the request that ended the call.
    pub fn cancel(&self, cause: impl Into<String>) -> bool {
        match self.call.upgrade() {
            Some(call) => call.cancel_local(cause.into()),
            None => false,
        }
    }

    /// None after the call was released
    pub fn state(&self) -> Option<CallState> {
        self.call.upgrade().map(|call| call.state())
    }
}

impl fmt::Debug for CallCanceller {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CallCanceller({:?})", self.state())
    }
}
