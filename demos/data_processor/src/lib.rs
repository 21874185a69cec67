//! Sample handler: counts the posted records and stamps the processing time.
//!
//! Build with `cargo build -p data_processor --release` and point
//! `FUNCTION_CODE_PATH` at the resulting shared library, with
//! `FUNCTION_HANDLER=data_processor.handler`.

use fnhost_macros::handler;
use fnhost_sdk::{json, respond, Event, Value};

#[handler]
pub fn handler(event: Event) -> Result<Value, String> {
    let now = chrono::Local::now().to_rfc3339();
    Ok(respond(200, summarize(&event.body, now)))
}

fn summarize(data: &Value, processed_at: String) -> Value {
    let record_count = match data {
        Value::Array(records) => records.len(),
        _ => 1,
    };

    json!({
        "processed_at": processed_at,
        "record_count": record_count,
        "summary": "Data processed successfully",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_array_records() {
        let summary = summarize(&json!([1, 2, 3]), "t".into());
        assert_eq!(summary["record_count"], 3);
        assert_eq!(summary["summary"], "Data processed successfully");
    }

    #[test]
    fn test_single_object_counts_as_one() {
        let summary = summarize(&json!({"id": 7}), "t".into());
        assert_eq!(summary["record_count"], 1);
    }

    #[test]
    fn test_exported_entry_point_round_trip() {
        let event = Event::default().with_body(json!(["a", "b"]));
        let request = fnhost_sdk::encode_event(&event).unwrap();

        let owned = unsafe {
            handler(fnhost_sdk::FnSlice {
                ptr: request.as_ptr(),
                len: request.len(),
            })
        };
        let bytes = unsafe { owned.reclaim() };

        match fnhost_sdk::decode_outcome(&bytes).unwrap() {
            fnhost_sdk::Outcome::Ok(value) => {
                assert_eq!(value["statusCode"], 200);
                assert_eq!(value["body"]["record_count"], 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
