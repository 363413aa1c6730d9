//! Translate transport callbacks into the call's state machine.
//!
//! A call starts [CallState::Active] and leaves it exactly once, the transition is a single CAS
//! so the transport closing the call, a local cancel and a scope cancel can race freely. Whoever
//! wins cancels the transport call if needed, then pushes the only terminal item into the sink,
//! wakes up a pending sender and cancels the call's scope (which releases the scope watcher).

use crate::call_scope::CallScope;
use crate::readiness::ReadyNotifier;
use crate::transport::CallListener;
use callbridge_core::{CallError, Scope, Status};
use captains_log::filter::LogFilter;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// A broken invariant of the transport contract is fatal, log it before panic
macro_rules! protocol_violation {
    ($logger: expr, $($arg:tt)+) => {{
        logger_error!($logger, $($arg)+);
        panic!($($arg)+);
    }};
}
pub(crate) use protocol_violation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CallState {
    Active = 0,
    /// Closed by the transport with an ok status
    Completed = 1,
    /// Closed by the transport with an error status
    Errored = 2,
    /// Cancelled by the application or a scope.
    ///
    /// Also the state of a call the bridge failed on its own (too many responses, inbound
    /// buffer overflow), since the transport call was cancelled. Such a call reports
    /// [CallError::Transport] to its consumer, not [CallError::Cancelled].
    Cancelled = 3,
}

impl CallState {
    #[inline(always)]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Completed,
            2 => Self::Errored,
            _ => Self::Cancelled,
        }
    }

    #[inline(always)]
    pub fn is_terminal(self) -> bool {
        self != Self::Active
    }
}

/// Where the adapter forwards what it receives.
pub(crate) trait ObserverSink<Resp>: Send + Sync + 'static {
    /// Return Err when the message cannot be accepted, the call will be failed with it
    fn push_message(&self, msg: Resp) -> Result<(), Status>;

    /// Invoked exactly once
    fn push_end(&self, outcome: Result<(), CallError>);
}

pub(crate) struct ResponseObserverAdapter<Req: Send + 'static, Resp: Send + Unpin + 'static> {
    id: u64,
    method: &'static str,
    state: AtomicU8,
    failure: OnceLock<CallError>,
    sink: Box<dyn ObserverSink<Resp>>,
    ready: Option<ReadyNotifier>,
    scope: Scope,
    owner: Weak<CallScope<Req, Resp>>,
    logger: Arc<LogFilter>,
}

impl<Req, Resp> ResponseObserverAdapter<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    pub fn new(
        id: u64, method: &'static str, owner: Weak<CallScope<Req, Resp>>,
        sink: Box<dyn ObserverSink<Resp>>, ready: Option<ReadyNotifier>, scope: Scope,
        logger: Arc<LogFilter>,
    ) -> Self {
        Self {
            id,
            method,
            state: AtomicU8::new(CallState::Active as u8),
            failure: OnceLock::new(),
            sink,
            ready,
            scope,
            owner,
            logger,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> CallState {
        CallState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The error the call terminated with, None while active or after normal completion
    #[inline]
    pub fn failure(&self) -> Option<&CallError> {
        self.failure.get()
    }

    /// Move from Active to `target`, return the previous state if the call already terminated.
    #[inline]
    pub fn terminate(&self, target: CallState, outcome: Result<(), CallError>) -> Result<(), CallState> {
        self.terminate_with(target, outcome, || {})
    }

    /// Like [terminate()](Self::terminate), `on_won` runs after the transition but before the
    /// outcome is published.
    pub fn terminate_with<F: FnOnce()>(
        &self, target: CallState, outcome: Result<(), CallError>, on_won: F,
    ) -> Result<(), CallState> {
        debug_assert!(target.is_terminal());
        if let Err(prev) = self.state.compare_exchange(
            CallState::Active as u8,
            target as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(CallState::from_u8(prev));
        }
        if let Err(e) = outcome.as_ref() {
            let _ = self.failure.set(e.clone());
        }
        on_won();
        self.sink.push_end(outcome);
        if let Some(ready) = self.ready.as_ref() {
            ready.notify();
        }
        self.scope.cancel("call terminated");
        Ok(())
    }
}

impl<Req, Resp> CallListener<Resp> for ResponseObserverAdapter<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn on_message(&self, msg: Resp) {
        match self.state() {
            CallState::Active => {
                if let Err(status) = self.sink.push_message(msg) {
                    logger_warn!(self.logger, "{:?} refused message: {}", self, status);
                    if let Some(owner) = self.owner.upgrade() {
                        owner.fail(status);
                    }
                } else {
                    logger_trace!(self.logger, "{:?} message buffered", self);
                }
            }
            CallState::Cancelled => {
                logger_trace!(self.logger, "{:?} drop message arrived after cancel", self);
            }
            s => {
                protocol_violation!(self.logger, "{:?} received message after {:?}", self, s);
            }
        }
    }

    #[inline]
    fn on_ready(&self) {
        if let Some(ready) = self.ready.as_ref() {
            ready.notify();
        }
    }

    fn on_close(&self, status: Status) {
        let r = if status.is_ok() {
            self.terminate(CallState::Completed, Ok(()))
        } else {
            self.terminate(CallState::Errored, Err(CallError::Transport(status.clone())))
        };
        match r {
            Ok(()) => {
                logger_debug!(self.logger, "{:?} closed with {}", self, status);
            }
            Err(CallState::Cancelled) => {
                logger_trace!(self.logger, "{:?} closed after cancel: {}", self, status);
            }
            Err(s) => {
                protocol_violation!(self.logger, "{:?} closed again after {:?}: {}", self, s, status);
            }
        }
    }
}

impl<Req, Resp> fmt::Debug for ResponseObserverAdapter<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + Unpin + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "call#{}({})", self.id, self.method)
    }
}
