//! The function host: configuration, shared state, invocation engine and
//! HTTP server.

mod config;
mod engine;
mod server;
mod state;

pub use config::{ConfigError, HostConfig, DEFAULT_CODE_PATH, DEFAULT_HANDLER};
pub use engine::{Invocation, InvocationEngine};
pub use server::{handle_request, BoxError, HostServer};
pub use state::RuntimeState;
