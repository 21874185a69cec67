//! Wire contract between the fnhost runtime and native handler libraries.
//!
//! A handler library exports two C-ABI symbols per handler:
//!
//! - `<name>(FnSlice) -> FnOwned`: receives a CBOR-encoded [`Event`] and
//!   returns a CBOR-encoded [`Outcome`].
//! - `<name>_free(FnOwned)`: releases the buffer returned by `<name>`.
//!
//! Handler crates normally never touch these symbols directly; the
//! `#[handler]` attribute from `fnhost-macros` generates them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use serde_json;
pub use serde_json::{json, Value};

#[repr(C)]
pub struct FnSlice {
    pub ptr: *const u8,
    pub len: usize,
}

#[repr(C)]
pub struct FnOwned {
    pub ptr: *mut u8,
    pub len: usize,
}

impl FnOwned {
    /// Hand a buffer over to the caller. It must come back through
    /// [`FnOwned::reclaim`] in the library that allocated it.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let mut bytes = bytes.into_boxed_slice();
        let len = bytes.len();
        let ptr = bytes.as_mut_ptr();
        std::mem::forget(bytes);
        Self { ptr, len }
    }

    /// Take ownership of a buffer produced by [`FnOwned::from_vec`].
    ///
    /// # Safety
    ///
    /// `self` must have been created by `from_vec` in the same allocator and
    /// must not be reclaimed twice.
    pub unsafe fn reclaim(self) -> Vec<u8> {
        if self.ptr.is_null() {
            return Vec::new();
        }
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr, self.len);
        Box::from_raw(slice).into_vec()
    }
}

/// Normalized HTTP request handed to a handler.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Event {
    /// Parsed JSON body, or an empty object.
    pub body: Value,
    pub headers: HashMap<String, String>,
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
}

impl Event {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            body: Value::Object(Default::default()),
            headers: HashMap::new(),
            method: method.into(),
            path: path.into(),
            query: HashMap::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new("POST", "/")
    }
}

/// What a handler produced: its return value or a failure message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(Value),
    Err(String),
}

/// Build the conventional `{statusCode, body}` return value.
pub fn respond(status_code: u16, body: Value) -> Value {
    json!({ "statusCode": status_code, "body": body })
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_cbor::Error),
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_cbor::Error),
}

pub fn encode_event(event: &Event) -> Result<Vec<u8>, WireError> {
    serde_cbor::to_vec(event).map_err(WireError::Encode)
}

pub fn decode_event(bytes: &[u8]) -> Result<Event, WireError> {
    serde_cbor::from_slice(bytes).map_err(WireError::Decode)
}

pub fn encode_outcome(outcome: &Outcome) -> Result<Vec<u8>, WireError> {
    serde_cbor::to_vec(outcome).map_err(WireError::Encode)
}

pub fn decode_outcome(bytes: &[u8]) -> Result<Outcome, WireError> {
    serde_cbor::from_slice(bytes).map_err(WireError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_survives_the_wire() {
        let event = Event::new("POST", "/")
            .with_body(json!([1, 2, {"nested": true}]))
            .with_header("content-type", "application/json")
            .with_query("page", "2");

        let bytes = encode_event(&event).unwrap();
        assert_eq!(decode_event(&bytes).unwrap(), event);
    }

    #[test]
    fn test_outcome_error_survives_the_wire() {
        let bytes = encode_outcome(&Outcome::Err("boom".into())).unwrap();
        assert_eq!(decode_outcome(&bytes).unwrap(), Outcome::Err("boom".into()));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decode_outcome(b"\xff\x00not cbor"),
            Err(WireError::Decode(_))
        ));
    }

    #[test]
    fn test_owned_buffer_reclaim() {
        let owned = FnOwned::from_vec(vec![1, 2, 3]);
        assert_eq!(owned.len, 3);
        let bytes = unsafe { owned.reclaim() };
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let event = Event::default().with_header("x-request-id", "abc");
        assert_eq!(event.header("X-Request-Id"), Some("abc"));
        assert_eq!(event.header("missing"), None);
    }

    #[test]
    fn test_respond_shape() {
        assert_eq!(
            respond(201, json!({"ok": true})),
            json!({"statusCode": 201, "body": {"ok": true}})
        );
    }
}
