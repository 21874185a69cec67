//! Invocation metrics with Prometheus text exposition.
//!
//! The registry owns its own recorder instead of installing a process-global
//! one, so every [`RuntimeState`](crate::runtime::RuntimeState) carries an
//! independent set of counters.

use metrics::{Counter, Histogram, Key, KeyName, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub const INVOCATIONS_TOTAL: &str = "function_invocations_total";
pub const COLD_STARTS_TOTAL: &str = "function_cold_starts_total";
pub const DURATION_SECONDS: &str = "function_duration_seconds";

/// Content type of [`MetricsRegistry::render`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Standard Prometheus client buckets, in seconds.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

pub struct MetricsRegistry {
    handle: PrometheusHandle,
    invocations: Counter,
    cold_starts: Counter,
    duration: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets(DURATION_BUCKETS)?
            .build_recorder();

        recorder.describe_counter(
            KeyName::from_const_str(INVOCATIONS_TOTAL),
            None,
            SharedString::const_str("Total function invocations"),
        );
        recorder.describe_counter(
            KeyName::from_const_str(COLD_STARTS_TOTAL),
            None,
            SharedString::const_str("Total cold starts"),
        );
        recorder.describe_histogram(
            KeyName::from_const_str(DURATION_SECONDS),
            Some(Unit::Seconds),
            SharedString::const_str("Function execution duration"),
        );

        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        let invocations =
            recorder.register_counter(&Key::from_static_name(INVOCATIONS_TOTAL), &metadata);
        let cold_starts =
            recorder.register_counter(&Key::from_static_name(COLD_STARTS_TOTAL), &metadata);
        let duration =
            recorder.register_histogram(&Key::from_static_name(DURATION_SECONDS), &metadata);

        Ok(Self {
            handle: recorder.handle(),
            invocations,
            cold_starts,
            duration,
        })
    }

    pub fn record_invocation(&self) {
        self.invocations.increment(1);
    }

    pub fn record_cold_start(&self) {
        self.cold_starts.increment(1);
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.duration.record(elapsed.as_secs_f64());
    }

    /// Render the current snapshot in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

/// Read an unlabeled sample value out of rendered exposition text.
#[cfg(test)]
pub(crate) fn sample_value(exposition: &str, name: &str) -> Option<f64> {
    exposition.lines().find_map(|line| {
        let rest = line.strip_prefix(name)?;
        let value = rest.strip_prefix(' ')?;
        value.trim().parse().ok()
    })
}
