//! Structured cancellation scopes.
//!
//! A [Scope] is a node of a parent-pointer tree. Cancelling a node cancels every descendant
//! before `cancel()` returns, and each node remembers the cause it was cancelled with so that
//! a descendant can tell what tore it down.
//!
//! Every call opened by the bridge lives in a child scope of the scope given in
//! [CallOptions](crate::CallOptions), so cancelling a parent cancels all calls issued under it.

use crate::future::Cancellable;
use crate::runtime::AsyncRT;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    token: CancellationToken,
    cause: OnceLock<String>,
    parent: Option<Scope>,
}

impl Scope {
    /// Create a root scope, only cancelled explicitly
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token: CancellationToken::new(),
                cause: OnceLock::new(),
                parent: None,
            }),
        }
    }

    /// Derive a child scope, cancelled together with `self`.
    ///
    /// A child created from an already cancelled scope starts cancelled.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                token: self.inner.token.child_token(),
                cause: OnceLock::new(),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel this scope and all its descendants.
    ///
    /// Return true if this call is the one that cancelled the scope, false if it was already
    /// cancelled (by itself or an ancestor).
    pub fn cancel(&self, cause: impl Into<String>) -> bool {
        if self.inner.token.is_cancelled() {
            return false;
        }
        let first = self.inner.cause.set(cause.into()).is_ok();
        self.inner.token.cancel();
        first
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolve once the scope is cancelled
    #[inline]
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// The cause this scope was cancelled with, or the nearest cancelled ancestor's.
    pub fn cause(&self) -> Option<String> {
        if let Some(cause) = self.inner.cause.get() {
            return Some(cause.clone());
        }
        if !self.is_cancelled() {
            return None;
        }
        let mut node = self.inner.parent.as_ref();
        while let Some(scope) = node {
            if let Some(cause) = scope.inner.cause.get() {
                return Some(cause.clone());
            }
            node = scope.inner.parent.as_ref();
        }
        None
    }

    #[inline]
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Return true when `ancestor` is on the parent chain of `self` (or is `self`)
    pub fn is_descendant_of(&self, ancestor: &Scope) -> bool {
        let mut node = Some(self);
        while let Some(scope) = node {
            if Arc::ptr_eq(&scope.inner, &ancestor.inner) {
                return true;
            }
            node = scope.inner.parent.as_ref();
        }
        false
    }

    /// Cancel the scope with `cause` once `d` elapsed, unless it is cancelled earlier.
    ///
    /// This is how a caller puts a timeout on the calls it issues.
    pub fn cancel_after<RT: AsyncRT>(&self, rt: &RT, d: Duration, cause: impl Into<String>) {
        let cause = cause.into();
        let scope = self.clone();
        rt.spawn_detach(async move {
            let watch = scope.clone();
            if Cancellable::new(RT::sleep(d), async move { watch.cancelled().await }).await.is_ok()
            {
                scope.cancel(cause);
            }
        });
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Scope(cancelled={}", self.is_cancelled())?;
        if let Some(cause) = self.cause() {
            write!(f, ", cause={}", cause)?;
        }
        write!(f, ")")
    }
}
