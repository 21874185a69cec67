//! Function handlers: the trait, the built-in fallbacks and the loader.

pub mod handler;
pub mod loader;

pub use handler::{EchoHandler, FailedLoadHandler, Handler, HandlerError, InvocationResult};
pub use loader::{EntryPoint, HandlerKind, HandlerLoader, LoadError, LoadedHandler, NativeHandler};
