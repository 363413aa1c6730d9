//! Outbound flow control.
//!
//! The transport tells whether it can take another request through [ClientCall::is_ready](crate::ClientCall::is_ready),
//! and calls `on_ready` when it flips back. Notifications are conflated into a channel of one
//! slot, a sender that finds the call not ready waits on it and checks again.

use crossfire::{AsyncRx, MTx, mpsc};

pub(crate) fn readiness() -> (ReadyNotifier, ReadyWaiter) {
    let (tx, rx) = mpsc::bounded_tx_blocking_rx_async::<()>(1);
    (ReadyNotifier { tx }, ReadyWaiter { rx })
}

pub(crate) struct ReadyNotifier {
    tx: MTx<()>,
}

impl ReadyNotifier {
    /// Never blocks, a pending notification already covers this one
    #[inline(always)]
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

pub(crate) struct ReadyWaiter {
    rx: AsyncRx<()>,
}

impl ReadyWaiter {
    /// Return false when the notifier is gone
    #[inline]
    pub async fn wait(&mut self) -> bool {
        self.rx.recv().await.is_ok()
    }
}
