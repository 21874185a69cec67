//! HTTP-facing types: request normalization and response building.

mod request;
mod response;

pub use request::{normalize, InvocationEvent};
pub use response::HostResponse;
