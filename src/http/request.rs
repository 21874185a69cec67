//! Event normalizer: inbound HTTP request to [`InvocationEvent`].

use hyper::http::request::Parts;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The normalized request handed to a handler.
pub type InvocationEvent = fnhost_sdk::Event;

/// Build an invocation event from request parts and the collected body.
///
/// Never fails. A body that is empty, `null` or not valid JSON becomes an
/// empty object. Repeated headers and query parameters keep their first
/// value.
///
/// Header names are delivered as hyper hands them over, which is always
/// lowercase: a client sending `X-Request-Id` shows up as `x-request-id`.
pub fn normalize(parts: &Parts, body: &[u8]) -> InvocationEvent {
    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        headers
            .entry(name.as_str().to_string())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    InvocationEvent {
        body: parse_body(body),
        headers,
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(parse_query).unwrap_or_default(),
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    match serde_json::from_slice(bytes) {
        Ok(Value::Null) | Err(_) => Value::Object(Map::new()),
        Ok(value) => value,
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}
