//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket workflow (opened, closed, cooldown rejections)
//! - First Blood monitor (cycles, announcements, cycle duration)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Tickets opened.
pub static TICKETS_OPENED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ctfdesk_tickets_opened_total", "Total tickets opened").unwrap()
});

/// Tickets closed by mode.
pub static TICKETS_CLOSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ctfdesk_tickets_closed_total", "Total tickets closed"),
        &["mode"], // "requested", "forced"
    )
    .unwrap()
});

/// Ticket requests rejected by the cooldown.
pub static COOLDOWN_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ctfdesk_cooldown_rejections_total",
        "Ticket requests rejected because the user is cooling down",
    )
    .unwrap()
});

// =============================================================================
// First Blood Metrics
// =============================================================================

/// Poll cycles by outcome.
pub static POLL_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ctfdesk_poll_cycles_total", "Total First Blood poll cycles"),
        &["outcome"], // "completed", "skipped", "failed", "overlapped"
    )
    .unwrap()
});

/// Announcements posted.
pub static FIRST_BLOODS_ANNOUNCED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ctfdesk_first_blood_announcements_total",
        "Total First Blood announcements posted",
    )
    .unwrap()
});

/// Poll cycle duration in seconds.
pub static POLL_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "ctfdesk_poll_duration_seconds",
            "Duration of a First Blood poll cycle",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TICKETS_OPENED.clone()),
        Box::new(TICKETS_CLOSED.clone()),
        Box::new(COOLDOWN_REJECTIONS.clone()),
        Box::new(POLL_CYCLES.clone()),
        Box::new(FIRST_BLOODS_ANNOUNCED.clone()),
        Box::new(POLL_DURATION.clone()),
    ]
}
