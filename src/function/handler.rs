//! Handler trait, built-in fallback handlers and invocation results.

use crate::http::InvocationEvent;
use serde_json::{json, Value};

/// A loaded function: takes an invocation event and returns a value.
///
/// Calls are synchronous and may block; the engine runs them on the
/// blocking pool.
pub trait Handler: Send + Sync {
    fn call(&self, event: InvocationEvent) -> Result<Value, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(InvocationEvent) -> Result<Value, HandlerError> + Send + Sync,
{
    fn call(&self, event: InvocationEvent) -> Result<Value, HandlerError> {
        self(event)
    }
}

/// Failure of a single invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// The handler reported an error.
    #[error("{0}")]
    Failed(String),
    /// The handler panicked or its worker died.
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error("function timed out after {0:?}")]
    TimedOut(std::time::Duration),
    /// The handler library returned bytes the host could not decode.
    #[error("invalid handler response: {0}")]
    Wire(String),
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl From<fnhost_sdk::WireError> for HandlerError {
    fn from(err: fnhost_sdk::WireError) -> Self {
        HandlerError::Wire(err.to_string())
    }
}

/// Returned when no handler library is present: echoes the event back.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn call(&self, event: InvocationEvent) -> Result<Value, HandlerError> {
        let event = serde_json::to_value(event).map_err(|e| HandlerError::new(e.to_string()))?;
        Ok(json!({ "statusCode": 200, "body": { "echo": event } }))
    }
}

/// Installed when loading failed; answers every request with the load error.
#[derive(Debug, Clone)]
pub struct FailedLoadHandler {
    message: String,
}

impl FailedLoadHandler {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Handler for FailedLoadHandler {
    fn call(&self, _event: InvocationEvent) -> Result<Value, HandlerError> {
        Ok(json!({ "statusCode": 500, "body": { "error": self.message } }))
    }
}

/// Status code and body derived from a handler's return value.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: Value,
}

impl InvocationResult {
    pub const DEFAULT_STATUS: u16 = 200;

    /// Map a return value to a result.
    ///
    /// An object carrying `statusCode` sets the status; its `body` field, if
    /// present, becomes the response body. Anything else is sent as-is
    /// with status 200.
    pub fn from_return_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Self {
                    status_code: Self::DEFAULT_STATUS,
                    body: other,
                }
            }
        };

        let status_code = match map.get("statusCode") {
            None => Self::DEFAULT_STATUS,
            Some(raw) => match raw.as_u64().and_then(|code| u16::try_from(code).ok()) {
                Some(code) if (100..=999).contains(&code) => code,
                _ => {
                    tracing::warn!("Handler returned invalid statusCode {}", raw);
                    return Self::error(format!("invalid statusCode returned by handler: {}", raw));
                }
            },
        };

        let body = match map.remove("body") {
            Some(body) => body,
            None => Value::Object(map),
        };

        Self { status_code, body }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: json!({ "error": message.into() }),
        }
    }
}

impl From<HandlerError> for InvocationResult {
    fn from(err: HandlerError) -> Self {
        InvocationResult::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_overrides_default() {
        let result =
            InvocationResult::from_return_value(json!({"statusCode": 201, "body": {"ok": true}}));
        assert_eq!(result.status_code, 201);
        assert_eq!(result.body, json!({"ok": true}));
    }

    #[test]
    fn test_plain_value_defaults_to_200() {
        let result = InvocationResult::from_return_value(json!([1, 2]));
        assert_eq!(result.status_code, 200);
        assert_eq!(result.body, json!([1, 2]));
    }

    #[test]
    fn test_object_without_body_is_sent_whole() {
        let result = InvocationResult::from_return_value(json!({"statusCode": 202, "queued": 3}));
        assert_eq!(result.status_code, 202);
        assert_eq!(result.body, json!({"statusCode": 202, "queued": 3}));
    }

    #[test]
    fn test_body_without_status_code() {
        let result = InvocationResult::from_return_value(json!({"body": "hi"}));
        assert_eq!(result.status_code, 200);
        assert_eq!(result.body, json!("hi"));
    }

    #[test]
    fn test_invalid_status_code_is_an_error() {
        for bad in [json!("201"), json!(42), json!(70000), json!(-1)] {
            let result = InvocationResult::from_return_value(json!({"statusCode": bad}));
            assert_eq!(result.status_code, 500);
            assert!(result.body["error"].is_string());
        }
    }

    #[test]
    fn test_echo_handler_wraps_event() {
        let event = InvocationEvent::new("POST", "/").with_body(json!([1, 2, 3]));
        let value = EchoHandler.call(event).unwrap();

        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"]["echo"]["body"], json!([1, 2, 3]));
        assert_eq!(value["body"]["echo"]["method"], "POST");
    }

    #[test]
    fn test_failed_load_handler_reports_message() {
        let handler = FailedLoadHandler::new("symbol not found");
        let result =
            InvocationResult::from_return_value(handler.call(InvocationEvent::default()).unwrap());

        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, json!({"error": "symbol not found"}));
    }

    #[test]
    fn test_closure_is_a_handler() {
        let handler = |event: InvocationEvent| -> Result<Value, HandlerError> {
            Ok(json!({ "path": event.path }))
        };
        assert_eq!(
            Handler::call(&handler, InvocationEvent::new("POST", "/x")).unwrap(),
            json!({"path": "/x"})
        );
    }

    #[test]
    fn test_handler_error_becomes_500() {
        let result: InvocationResult = HandlerError::new("boom").into();
        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, json!({"error": "boom"}));
    }
}
