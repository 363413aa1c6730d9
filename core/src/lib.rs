//! # callbridge-core
//!
//! This crate provides the core utilities for [`callbridge`](https://docs.rs/callbridge).
//! It includes the status and error types, call options, cancellation scopes and the runtime
//! trait shared by the other crates in the workspace.

mod config;
pub use config::CallOptions;
pub mod error;
pub use error::{CallError, Code, Metadata, Status};
pub mod future;
pub mod runtime;
pub mod scope;
pub use scope::Scope;
