//! The inner stage of the response pipeline.
//!
//! Transport callbacks must never block, so messages first land in an unbounded queue
//! ([MessageBuffer]), owned by the transport side. The consumer side ([BufferReceiver]) is
//! polled by [ResponseStream](crate::ResponseStream), which only hands one message at a time to
//! the application and grants credit back to the transport as messages are consumed.
//!
//! The termination of the call is queued behind the messages, so the consumer always sees the
//! messages that arrived before it.

use crate::observer::ObserverSink;
use callbridge_core::{CallError, Status};
use crossfire::stream::AsyncStream;
use crossfire::{MTx, mpsc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

pub(crate) enum Inbound<Resp> {
    Message(Resp),
    End(Result<(), CallError>),
}

pub(crate) struct MessageBuffer<Resp> {
    tx: MTx<Inbound<Resp>>,
    queued: Arc<AtomicUsize>,
    limit: usize,
}

pub(crate) struct BufferReceiver<Resp> {
    rx: AsyncStream<Inbound<Resp>>,
    queued: Arc<AtomicUsize>,
}

impl<Resp: Send + Unpin + 'static> MessageBuffer<Resp> {
    /// `limit` of 0 is unbounded
    pub fn new(limit: usize) -> (Self, BufferReceiver<Resp>) {
        let (tx, rx) = mpsc::unbounded_async();
        let queued = Arc::new(AtomicUsize::new(0));
        (
            Self { tx, queued: queued.clone(), limit },
            BufferReceiver { rx: rx.into_stream(), queued },
        )
    }
}

impl<Resp: Send + Unpin + 'static> ObserverSink<Resp> for MessageBuffer<Resp> {
    fn push_message(&self, msg: Resp) -> Result<(), Status> {
        let queued = self.queued.fetch_add(1, Ordering::AcqRel) + 1;
        if self.tx.send(Inbound::Message(msg)).is_err() {
            // receiver dropped, the stream is gone and the call is being cancelled
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return Ok(());
        }
        if self.limit > 0 && queued > self.limit {
            return Err(Status::resource_exhausted("inbound buffer overflow"));
        }
        Ok(())
    }

    fn push_end(&self, outcome: Result<(), CallError>) {
        let _ = self.tx.send(Inbound::End(outcome));
    }
}

impl<Resp: Send + Unpin + 'static> BufferReceiver<Resp> {
    #[inline]
    pub fn poll_item(&mut self, ctx: &mut Context) -> Poll<Option<Inbound<Resp>>> {
        let r = self.rx.poll_item(ctx);
        if let Poll::Ready(Some(Inbound::Message(_))) = &r {
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }
        r
    }

    /// Messages waiting in the buffer
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}
