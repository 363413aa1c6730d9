//! # callbridge
//!
//! Turn a callback-driven RPC transport into async calls.
//!
//! The transport implements [Channel] and [ClientCall], and reports back through a
//! [CallListener] from its own threads. On top of it this crate offers the four call shapes:
//!
//! - [unary]: a future resolving to the single response
//! - [server_streaming]: a [ResponseStream] pulling responses with flow control
//! - [client_streaming]: a [RequestSender] that waits for outbound credit, and a single response
//! - [bidi]: both directions, independently closed
//!
//! Every call lives in a child of the [Scope] given in [CallOptions], cancelling the scope
//! cancels the call. Each call terminates exactly once, whichever of completion, failure, local
//! cancellation or scope cancellation comes first, and the transport is cancelled at most once.

#[macro_use]
extern crate captains_log;

pub mod bidi;
mod buffer;
mod call_scope;
mod client;
pub mod client_streaming;
mod observer;
mod readiness;
mod sender;
pub mod server_streaming;
mod stream;
pub mod transport;
pub mod unary;

pub use bidi::BidiStreamingCall;
pub use call_scope::CallCanceller;
pub use client::CallBridge;
pub use client_streaming::ClientStreamingCall;
pub use observer::CallState;
pub use sender::RequestSender;
pub use stream::ResponseStream;
pub use transport::{CallListener, Channel, ClientCall, MethodDescriptor, MethodType};
pub use unary::UnaryResponse;

pub use callbridge_core::{CallError, CallOptions, Code, Metadata, Scope, Status, runtime::AsyncRT};
