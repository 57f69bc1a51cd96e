//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the bot process:
//! - Discord interaction metrics (commands, buttons, modals, failures)
//! - Open ticket count and monitor status (collected dynamically)
//! - Everything exported by `ctfdesk_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// Interaction Metrics
// =============================================================================

/// Interactions handled, by kind and name.
pub static INTERACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ctfdesk_interactions_total", "Discord interactions handled"),
        &["kind", "name"], // kind: "command", "component", "modal"
    )
    .unwrap()
});

/// Interactions that ended with an error reply.
pub static INTERACTION_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ctfdesk_interaction_errors_total",
            "Discord interactions answered with an error",
        ),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// State Metrics (collected dynamically)
// =============================================================================

/// Tickets currently open.
pub static TICKETS_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ctfdesk_tickets_open", "Number of tickets currently open").unwrap()
});

/// First Blood monitor running state (1 = running, 0 = stopped).
pub static MONITOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ctfdesk_monitor_running",
        "Whether the First Blood monitor is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Challenges already announced.
pub static NOTIFIED_CHALLENGES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ctfdesk_notified_challenges",
        "Number of challenges whose First Blood was announced",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(INTERACTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(INTERACTION_ERRORS.clone()))
        .unwrap();

    registry.register(Box::new(TICKETS_OPEN.clone())).unwrap();
    registry
        .register(Box::new(MONITOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(NOTIFIED_CHALLENGES.clone()))
        .unwrap();

    // Core metrics (tickets, First Blood monitor)
    for metric in ctfdesk_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges from current application state.
///
/// Called before encoding so a scrape sees current values.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(open) = state.controller().active_tickets() {
        TICKETS_OPEN.set(open.len() as i64);
    }

    if let Some(scheduler) = state.scheduler() {
        let status = scheduler.status().await;
        MONITOR_RUNNING.set(if status.running { 1 } else { 0 });
        NOTIFIED_CHALLENGES.set(status.notified_count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        INTERACTIONS_TOTAL
            .with_label_values(&["command", "ping"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("ctfdesk_interactions_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_includes_core_metrics() {
        ctfdesk_core::metrics::TICKETS_OPENED.inc_by(0);
        ctfdesk_core::metrics::POLL_CYCLES
            .with_label_values(&["completed"])
            .inc_by(0);
        TICKETS_OPEN.set(0);
        MONITOR_RUNNING.set(0);

        let output = encode_metrics();

        assert!(output.contains("ctfdesk_tickets_opened_total"));
        assert!(output.contains("ctfdesk_poll_cycles_total"));
        assert!(output.contains("ctfdesk_tickets_open"));
        assert!(output.contains("ctfdesk_monitor_running"));
    }
}
