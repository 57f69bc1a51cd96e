//! Repeating timer driving the First Blood detector.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::metrics;

use super::{FirstBloodDetector, MonitorError};

/// Result of the most recent cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed {
        challenges: usize,
        announced: usize,
        pending: usize,
        failed: usize,
    },
    /// No alert channel configured.
    Skipped,
    Failed {
        error: String,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed { .. } => "completed",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Failed { .. } => "failed",
        }
    }
}

/// Scheduler status for `/ctfd-status` and the HTTP API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<CycleOutcome>,
    pub notified_count: usize,
    pub alert_channel_id: Option<u64>,
}

#[derive(Debug, Default)]
struct LastCycle {
    at: Option<DateTime<Utc>>,
    outcome: Option<CycleOutcome>,
}

/// Runs the detector every `interval`.
///
/// Ticks never overlap: a tick arriving while a cycle is still running is
/// skipped, and missed ticks are not replayed.
pub struct PollScheduler {
    detector: Arc<FirstBloodDetector>,
    interval: Duration,
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    cycle_lock: Arc<Mutex<()>>,
    last: Arc<RwLock<LastCycle>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PollScheduler {
    pub fn new(detector: Arc<FirstBloodDetector>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            detector,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            cycles: Arc::new(AtomicU64::new(0)),
            cycle_lock: Arc::new(Mutex::new(())),
            last: Arc::new(RwLock::new(LastCycle::default())),
            shutdown_tx,
        }
    }

    pub fn detector(&self) -> &Arc<FirstBloodDetector> {
        &self.detector
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start polling. Returns false if already running.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("First Blood monitor already running");
            return false;
        }

        info!(
            interval_secs = self.interval.as_secs(),
            "Starting First Blood monitor"
        );
        self.spawn_poll_loop();
        true
    }

    /// Stop polling. Returns false if not running.
    ///
    /// A cycle already in progress finishes on its own.
    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("First Blood monitor not running");
            return false;
        }

        let _ = self.shutdown_tx.send(());
        info!("First Blood monitor stopped");
        true
    }

    pub async fn status(&self) -> SchedulerStatus {
        let last = self.last.read().await;
        SchedulerStatus {
            running: self.is_running(),
            interval_secs: self.interval.as_secs(),
            cycles: self.cycles.load(Ordering::Relaxed),
            last_cycle_at: last.at,
            last_outcome: last.outcome.clone(),
            notified_count: self.detector.notified_count().await,
            alert_channel_id: self.detector.alert_channel().await,
        }
    }

    /// Run one cycle now unless one is already in progress.
    ///
    /// Returns `None` when skipped because of an overlapping cycle.
    pub async fn run_cycle(&self) -> Option<CycleOutcome> {
        run_guarded(
            &self.detector,
            &self.cycle_lock,
            &self.cycles,
            &self.last,
        )
        .await
    }

    fn spawn_poll_loop(&self) {
        let detector = Arc::clone(&self.detector);
        let running = Arc::clone(&self.running);
        let cycles = Arc::clone(&self.cycles);
        let cycle_lock = Arc::clone(&self.cycle_lock);
        let last = Arc::clone(&self.last);
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("First Blood poll loop started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("First Blood poll loop received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }

                        let detector = Arc::clone(&detector);
                        let cycle_lock = Arc::clone(&cycle_lock);
                        let cycles = Arc::clone(&cycles);
                        let last = Arc::clone(&last);
                        // Detached; overlapping ticks are rejected by the cycle lock
                        tokio::spawn(async move {
                            run_guarded(&detector, &cycle_lock, &cycles, &last).await;
                        });
                    }
                }
            }
            info!("First Blood poll loop stopped");
        });
    }
}

async fn run_guarded(
    detector: &FirstBloodDetector,
    cycle_lock: &Mutex<()>,
    cycles: &AtomicU64,
    last: &RwLock<LastCycle>,
) -> Option<CycleOutcome> {
    let Ok(_guard) = cycle_lock.try_lock() else {
        debug!("Previous First Blood cycle still running, skipping tick");
        metrics::POLL_CYCLES.with_label_values(&["overlapped"]).inc();
        return None;
    };

    let started = Instant::now();
    let outcome = match detector.check_once().await {
        Ok(report) => CycleOutcome::Completed {
            challenges: report.challenges,
            announced: report.announced.len(),
            pending: report.pending,
            failed: report.failed,
        },
        Err(MonitorError::NoAlertChannel) => {
            warn!("No First Blood alert channel configured, skipping cycle");
            CycleOutcome::Skipped
        }
        Err(e) => {
            error!("First Blood cycle failed: {}", e);
            CycleOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    metrics::POLL_DURATION.observe(started.elapsed().as_secs_f64());
    metrics::POLL_CYCLES
        .with_label_values(&[outcome.label()])
        .inc();

    cycles.fetch_add(1, Ordering::Relaxed);
    let mut last = last.write().await;
    last.at = Some(Utc::now());
    last.outcome = Some(outcome.clone());

    Some(outcome)
}
