//! Process-wide runtime state, owned explicitly and shared by `Arc`.

use crate::function::{Handler, HandlerKind, LoadedHandler};
use crate::metrics::MetricsRegistry;
use metrics_exporter_prometheus::BuildError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Loaded handler, cold-start latch and metrics.
///
/// `handler` is fixed at construction. `cold_start` starts `true` and is
/// cleared exactly once, by the first invocation.
pub struct RuntimeState {
    handler: Arc<dyn Handler>,
    handler_kind: HandlerKind,
    cold_start: AtomicBool,
    metrics: MetricsRegistry,
    function_name: Option<String>,
}

impl RuntimeState {
    pub fn new(loaded: LoadedHandler) -> Result<Self, BuildError> {
        Ok(Self {
            handler: loaded.handler,
            handler_kind: loaded.kind,
            cold_start: AtomicBool::new(true),
            metrics: MetricsRegistry::new()?,
            function_name: None,
        })
    }

    /// Attach the informational function name.
    pub fn with_function_name(mut self, name: Option<String>) -> Self {
        self.function_name = name;
        self
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        self.handler.clone()
    }

    pub fn handler_kind(&self) -> HandlerKind {
        self.handler_kind
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Current value of the cold-start flag.
    pub fn is_cold(&self) -> bool {
        self.cold_start.load(Ordering::Acquire)
    }

    /// Clear the cold-start flag. Returns `true` for exactly one caller over
    /// the lifetime of the state.
    pub fn take_cold_start(&self) -> bool {
        self.cold_start.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeState")
            .field("handler_kind", &self.handler_kind)
            .field("cold_start", &self.is_cold())
            .field("function_name", &self.function_name)
            .finish()
    }
}
