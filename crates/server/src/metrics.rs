//! Prometheus metrics
//!
//! Counters for the reminder call flow, exported at `/metrics`.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use medcall_core::Decision;

/// Install the Prometheus recorder.
///
/// Returns `None` when a recorder is already installed (e.g. in tests);
/// counters then become no-ops, which is harmless.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(%err, "metrics recorder not installed");
            None
        }
    }
}

/// A dial attempt was placed with the provider.
pub fn record_call_started() {
    counter!("medcall_calls_started_total").increment(1);
}

/// A gather result (or timeout) was classified.
pub fn record_decision(decision: Decision) {
    counter!("medcall_decisions_total", "decision" => decision.as_str()).increment(1);
}

/// A follow-up attempt was scheduled after a denial.
pub fn record_follow_up_scheduled() {
    counter!("medcall_follow_ups_scheduled_total").increment(1);
}

/// The provider reported a failed, busy or unanswered leg.
pub fn record_provider_failure() {
    counter!("medcall_provider_failures_total").increment(1);
}
