//! The poll tick: one owner for all cross-poll state.
//!
//! [`Monitor`] holds the transition register and the sleep assertion, and
//! runs scan → markers → reconcile → alert → assertion synchronously. Nothing
//! here is shared between threads; callers that want ticks off the UI thread
//! should move the whole `Monitor` and send [`TickReport`]s back.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::command::{CommandExecutor, SystemCommand};
use crate::config::PulseConfig;
use crate::error::Result;
use crate::markers::{MarkerStats, MarkerStore};
use crate::process::ProcessScanner;
use crate::reconcile::{reconcile, ReconciledView};
use crate::sleep::{CaffeinateAssertion, PowerAssertion, SleepAssertionManager};
use crate::transition::{AlertEvent, TransitionTracker};

/// Everything one tick observed and decided.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub observed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub view: ReconciledView,
    pub alert: Option<AlertEvent>,
    pub assertion_held: bool,
    pub markers: MarkerStats,
}

pub struct Monitor<E: CommandExecutor, P: PowerAssertion> {
    scanner: ProcessScanner<E>,
    markers: MarkerStore,
    tracker: TransitionTracker,
    sleep: SleepAssertionManager<P>,
    active_threshold: f64,
}

impl Monitor<SystemCommand, CaffeinateAssertion> {
    pub fn from_config(config: &PulseConfig) -> Result<Self> {
        let executor = SystemCommand::new(config.command_timeout());
        Ok(Self::new(
            ProcessScanner::new(executor, config.process_pattern.clone()),
            MarkerStore::new(config.resolve_marker_dir()?, config.marker_retention()),
            SleepAssertionManager::new(CaffeinateAssertion::new()),
            config.active_cpu_threshold,
        ))
    }
}

impl<E: CommandExecutor, P: PowerAssertion> Monitor<E, P> {
    pub fn new(
        scanner: ProcessScanner<E>,
        markers: MarkerStore,
        sleep: SleepAssertionManager<P>,
        active_threshold: f64,
    ) -> Self {
        Self {
            scanner,
            markers,
            tracker: TransitionTracker::new(),
            sleep,
            active_threshold,
        }
    }

    pub fn assertion_held(&self) -> bool {
        self.sleep.is_held()
    }

    pub fn observe(&self) -> TickReport {
        self.observe_at(Utc::now())
    }

    /// Observes without touching the alert register or the assertion.
    ///
    /// Stale markers are still cleaned up.
    pub fn observe_at(&self, now: DateTime<Utc>) -> TickReport {
        let processes = self.scanner.scan();
        let marker_scan = self.markers.scan_at(now);
        let view = reconcile(&processes, marker_scan.markers, self.active_threshold);

        debug!(
            processes = processes.len(),
            active = view.active.len(),
            waiting = view.waiting.len(),
            markers_expired = marker_scan.stats.expired,
            "Observed sessions"
        );

        TickReport {
            observed_at: now,
            view,
            alert: None,
            assertion_held: self.sleep.is_held(),
            markers: marker_scan.stats,
        }
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = self.observe_at(now);

        report.alert = self.tracker.observe(report.view.waiting.len());
        if let Some(alert) = report.alert {
            info!(waiting = alert.waiting_count, "Sessions waiting for input");
        }

        self.sleep.update(report.view.has_active());
        report.assertion_held = self.sleep.is_held();
        report
    }

    /// Ticks every `interval` until `on_tick` breaks or `stop` is set. A slow
    /// tick delays the next one; ticks never overlap. The wait between ticks
    /// is sliced so a raised `stop` is noticed within [`STOP_POLL`].
    pub fn run<F>(&mut self, interval: Duration, stop: &AtomicBool, mut on_tick: F)
    where
        F: FnMut(&TickReport) -> ControlFlow<()>,
    {
        while !stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            let report = self.tick();
            if on_tick(&report).is_break() {
                break;
            }
            let deadline = started + interval;
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                thread::sleep(remaining.min(STOP_POLL));
            }
        }
        debug!("Monitor loop exited");
    }
}

/// Upper bound on how long a stop request waits to be noticed.
pub const STOP_POLL: Duration = Duration::from_millis(100);
