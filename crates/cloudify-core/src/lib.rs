//! cloudify-core
//!
//! Provider-agnostic contract shared by every cloudify provider: the wire
//! types exchanged with a remote function, the `CallId` correlation
//! identifier, and the `Provider` trait that a concrete backend (AWS, a
//! local in-process executor, ...) implements.
//!
//! Concrete backends own their own error types and state — this crate only
//! fixes the shape callers program against.

pub mod error;
pub mod packager;
pub mod provider;
pub mod wire;

pub use error::CoreError;
pub use packager::{PackageError, PackagedCode, Packager};
pub use provider::Provider;
pub use wire::{CallId, FunctionCall, FunctionReturn, InvokeResult, RemoteError};
