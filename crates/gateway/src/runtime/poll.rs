//! Poll loop. Scans the store on a fixed interval and dispatches due
//! entries.
//!
//! One cycle: snapshot → due check → claim → bounded concurrent dispatch →
//! commit successes → release claims. Every per-entry failure is logged and
//! counted; none of them aborts the cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use es_domain::config::SchedulerConfig;

use super::dispatch::Dispatcher;
use super::due::is_due;
use super::entries::{Entry, EntryStore};

/// Outcome counts for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Entries in the snapshot.
    pub scanned: usize,
    pub due: usize,
    pub dispatched: usize,
    /// Fetch or delivery failures, including panicked dispatch tasks.
    pub failed: usize,
    /// Stored entries whose date, time or timezone could not be read.
    pub data_errors: usize,
    /// Due entries claimed by another cycle, or removed since the snapshot.
    pub skipped_in_flight: usize,
    /// Entries actually removed from the store. Lower than `dispatched`
    /// when an entry was deleted while its dispatch was in flight.
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastCycle {
    pub finished_at: DateTime<Utc>,
    pub report: CycleReport,
}

pub struct PollLoop {
    store: Arc<EntryStore>,
    dispatcher: Dispatcher,
    interval: Duration,
    /// Bounds outbound dispatches across every cycle sharing this loop,
    /// timer-driven and manual alike.
    permits: Arc<Semaphore>,
    quarantine_after: u32,
    cycles: AtomicU64,
    last: Mutex<Option<LastCycle>>,
}

impl PollLoop {
    pub fn new(store: Arc<EntryStore>, dispatcher: Dispatcher, config: &SchedulerConfig) -> Self {
        let config = config.clamped();
        Self {
            store,
            dispatcher,
            interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            permits: Arc::new(Semaphore::new(config.max_concurrent_dispatches)),
            quarantine_after: config.quarantine_after,
            cycles: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn last_cycle(&self) -> Option<LastCycle> {
        self.last.lock().clone()
    }

    /// Run one scan-and-dispatch pass against the store as of `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> CycleReport {
        let snapshot = self.store.snapshot();
        let mut report = CycleReport {
            scanned: snapshot.len(),
            ..Default::default()
        };

        let mut claimed = Vec::new();
        for entry in snapshot {
            match is_due(&entry, now) {
                Ok(false) => self.store.clear_due_error(&entry.id),
                Ok(true) => {
                    report.due += 1;
                    self.store.clear_due_error(&entry.id);
                    match self.store.claim(entry.id) {
                        Some(claim) => claimed.push((entry, claim)),
                        None => {
                            report.skipped_in_flight += 1;
                            tracing::debug!(entry_id = %entry.id, "entry in flight or already gone, skipping");
                        }
                    }
                }
                Err(e) => {
                    report.data_errors += 1;
                    self.note_data_error(&entry, &e.to_string());
                }
            }
        }

        let mut tasks = JoinSet::new();
        for (entry, claim) in claimed {
            let semaphore = self.permits.clone();
            let dispatcher = self.dispatcher.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = dispatcher.dispatch(&entry).await;
                (entry, claim, result)
            });
        }

        let mut records = Vec::new();
        // Claims of successful dispatches stay held until the commit below.
        let mut held = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((entry, claim, Ok(record))) => {
                    tracing::info!(
                        entry_id = %entry.id,
                        recipient = %entry.recipient,
                        subject = %record.subject,
                        sink = self.dispatcher.sink_name(),
                        "entry dispatched"
                    );
                    records.push(record);
                    held.push(claim);
                }
                Ok((entry, _claim, Err(e))) => {
                    report.failed += 1;
                    tracing::warn!(
                        entry_id = %entry.id,
                        recipient = %entry.recipient,
                        stage = e.stage(),
                        error = %e,
                        "dispatch failed, will retry next cycle"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "dispatch task panicked");
                }
            }
        }

        report.dispatched = records.len();
        report.removed = self.store.commit_deliveries(records);
        drop(held);

        self.cycles.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = Some(LastCycle {
            finished_at: Utc::now(),
            report,
        });

        tracing::debug!(
            scanned = report.scanned,
            due = report.due,
            dispatched = report.dispatched,
            failed = report.failed,
            data_errors = report.data_errors,
            skipped_in_flight = report.skipped_in_flight,
            removed = report.removed,
            "poll cycle complete"
        );
        report
    }

    fn note_data_error(&self, entry: &Entry, message: &str) {
        let attempts = self.store.record_due_error(&entry.id, message);
        tracing::warn!(
            entry_id = %entry.id,
            date = %entry.fire_date,
            time = %entry.fire_time,
            timezone = %entry.fire_timezone,
            error = %message,
            attempts = attempts.unwrap_or(0),
            "cannot compute due time, leaving entry in place"
        );
        if attempts == Some(self.quarantine_after) {
            tracing::warn!(
                entry_id = %entry.id,
                attempts = self.quarantine_after,
                "entry quarantined (still retried every cycle)"
            );
        }
    }

    /// Drive `run_once` every interval until `stop` flips to true. A cycle
    /// in progress when the signal arrives runs to completion first.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "poll loop started");
        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    // Sender dropped counts as a stop.
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }
            self.run_once(Utc::now()).await;
        }
        tracing::info!("poll loop stopped");
    }
}
