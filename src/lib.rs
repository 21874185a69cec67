//! # fnhost - single-function execution host
//!
//! fnhost loads one user-supplied handler at startup, serves it over HTTP
//! and reports invocation metrics and readiness.
//!
//! ## Architecture
//!
//! ```text
//!   POST /          ┌────────────┐   ┌──────────────────┐   ┌─────────────┐
//! ─────────────────▶│ normalizer │──▶│ invocation engine │──▶│ handler     │
//!                   └────────────┘   └──────────────────┘   │ (loaded     │
//!   GET /health                               │              │  once)      │
//!   GET /ready     ┌──────────────┐           ▼              └─────────────┘
//! ────────────────▶│ RuntimeState │◀── cold-start latch, metrics
//!   GET /metrics   └──────────────┘
//! ```
//!
//! ## Handler lifecycle
//!
//! 1. **Load**: [`HandlerLoader`] opens the shared library at
//!    `FUNCTION_CODE_PATH` and resolves the export named by
//!    `FUNCTION_HANDLER`. A missing library installs an echo handler; any
//!    load failure installs a handler that answers 500 with the load error.
//! 2. **Invoke**: each `POST /` is normalized into an [`InvocationEvent`]
//!    and run on the blocking pool. The first invocation clears the
//!    cold-start flag.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fnhost::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let config = HostConfig::from_env()?;
//!     HostServer::from_config(config)?.run().await
//! }
//! ```

pub mod function;
pub mod http;
pub mod metrics;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::function::{Handler, HandlerError, HandlerKind, HandlerLoader, InvocationResult};
    pub use crate::http::InvocationEvent;
    pub use crate::runtime::{BoxError, HostConfig, HostServer, InvocationEngine, RuntimeState};
}

pub use function::{Handler, HandlerError, HandlerLoader, InvocationResult};
pub use http::InvocationEvent;
pub use runtime::{HostConfig, HostServer, InvocationEngine, RuntimeState};
