//! Invocation engine: runs the loaded handler against one event.

use crate::function::{HandlerError, InvocationResult};
use crate::http::InvocationEvent;
use crate::runtime::RuntimeState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Outcome of one invocation, with the metadata the HTTP surface reports.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub result: InvocationResult,
    pub was_cold_start: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct InvocationEngine {
    state: Arc<RuntimeState>,
    timeout: Option<Duration>,
}

impl InvocationEngine {
    pub fn new(state: Arc<RuntimeState>) -> Self {
        Self {
            state,
            timeout: None,
        }
    }

    /// Bound every handler call. A call that runs past the limit is
    /// answered with a 500; its worker thread is left to finish on its own.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    pub async fn invoke(&self, event: InvocationEvent) -> Invocation {
        let was_cold_start = self.state.take_cold_start();
        if was_cold_start {
            self.state.metrics().record_cold_start();
        }

        let start = Instant::now();
        let outcome = self.call_handler(event).await;
        let elapsed = start.elapsed();

        let metrics = self.state.metrics();
        metrics.record_invocation();
        metrics.observe_duration(elapsed);

        let result = match outcome {
            Ok(value) => InvocationResult::from_return_value(value),
            Err(e) => {
                error!("Error executing function: {}", e);
                e.into()
            }
        };

        debug!(
            "Invocation finished with {} in {:?} (cold start: {})",
            result.status_code, elapsed, was_cold_start
        );

        Invocation {
            result,
            was_cold_start,
            elapsed,
        }
    }

    async fn call_handler(&self, event: InvocationEvent) -> Result<serde_json::Value, HandlerError> {
        let handler = self.state.handler();
        let task = tokio::task::spawn_blocking(move || handler.call(event));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => return Err(HandlerError::TimedOut(limit)),
            },
            None => task.await,
        };

        joined.map_err(|e| {
            if e.is_panic() {
                HandlerError::Panicked(panic_message(e.into_panic()))
            } else {
                HandlerError::Panicked(e.to_string())
            }
        })?
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{EchoHandler, Handler, HandlerKind, LoadedHandler};
    use crate::metrics::{sample_value, COLD_STARTS_TOTAL, INVOCATIONS_TOTAL};
    use serde_json::{json, Value};

    fn engine_with(handler: impl Handler + 'static) -> InvocationEngine {
        let state = RuntimeState::new(LoadedHandler {
            handler: Arc::new(handler),
            kind: HandlerKind::Loaded,
        })
        .unwrap();
        InvocationEngine::new(Arc::new(state))
    }

    fn counter(engine: &InvocationEngine, name: &str) -> f64 {
        sample_value(&engine.state().metrics().render(), name).unwrap()
    }

    #[tokio::test]
    async fn test_status_code_from_handler() {
        let engine = engine_with(|_: InvocationEvent| -> Result<Value, HandlerError> {
            Ok(json!({"statusCode": 201, "body": {"ok": true}}))
        });

        let invocation = engine.invoke(InvocationEvent::default()).await;
        assert_eq!(invocation.result.status_code, 201);
        assert_eq!(invocation.result.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_only_first_invocation_is_cold() {
        let engine = engine_with(EchoHandler);

        let first = engine.invoke(InvocationEvent::default()).await;
        let second = engine.invoke(InvocationEvent::default()).await;

        assert!(first.was_cold_start);
        assert!(!second.was_cold_start);
        assert!(!engine.state().is_cold());
        assert_eq!(counter(&engine, COLD_STARTS_TOTAL), 1.0);
        assert_eq!(counter(&engine, INVOCATIONS_TOTAL), 2.0);
    }

    #[tokio::test]
    async fn test_handler_error_is_500_and_counted() {
        let engine = engine_with(|_: InvocationEvent| -> Result<Value, HandlerError> {
            Err(HandlerError::new("division by zero"))
        });

        let failed = engine.invoke(InvocationEvent::default()).await;
        assert_eq!(failed.result.status_code, 500);
        assert_eq!(failed.result.body, json!({"error": "division by zero"}));

        let again = engine.invoke(InvocationEvent::default()).await;
        assert_eq!(again.result.status_code, 500);
        assert_eq!(counter(&engine, INVOCATIONS_TOTAL), 2.0);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let engine = engine_with(|_: InvocationEvent| -> Result<Value, HandlerError> {
            panic!("handler exploded")
        });

        let invocation = engine.invoke(InvocationEvent::default()).await;
        assert_eq!(invocation.result.status_code, 500);
        assert_eq!(
            invocation.result.body["error"],
            "handler panicked: handler exploded"
        );
        assert_eq!(counter(&engine, INVOCATIONS_TOTAL), 1.0);
    }

    #[tokio::test]
    async fn test_timeout_produces_500() {
        let engine = engine_with(|_: InvocationEvent| -> Result<Value, HandlerError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(json!({}))
        })
        .with_timeout(Some(Duration::from_millis(20)));

        let invocation = engine.invoke(InvocationEvent::default()).await;
        assert_eq!(invocation.result.status_code, 500);
        assert!(invocation.result.body["error"]
            .as_str()
            .unwrap()
            .contains("timed out"));
        assert_eq!(counter(&engine, INVOCATIONS_TOTAL), 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_requests_single_cold_start() {
        let engine = engine_with(EchoHandler);

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.invoke(InvocationEvent::default()).await })
            })
            .collect();

        let mut cold = 0;
        for task in tasks {
            if task.await.unwrap().was_cold_start {
                cold += 1;
            }
        }

        assert_eq!(cold, 1);
        assert_eq!(counter(&engine, COLD_STARTS_TOTAL), 1.0);
        assert_eq!(counter(&engine, INVOCATIONS_TOTAL), 32.0);
    }
}
