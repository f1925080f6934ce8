//! Scheduler lifecycle: owns the single background driver task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::poll::{CycleReport, LastCycle, PollLoop};

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub cycles_completed: u64,
    pub last_cycle: Option<LastCycle>,
}

/// Stopped ⇄ Running. At most one driver task exists at a time.
pub struct Scheduler {
    poll: Arc<PollLoop>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(poll: Arc<PollLoop>) -> Self {
        Self {
            poll,
            running: Mutex::new(None),
        }
    }

    pub fn poll_loop(&self) -> &Arc<PollLoop> {
        &self.poll
    }

    /// Spawn the driver. Returns `false` (and does nothing) when it is
    /// already running.
    pub fn start(&self) -> bool {
        let mut slot = self.running.lock();
        if slot.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::debug!("scheduler already running");
            return false;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.poll.clone().run(stop_rx));
        *slot = Some(Running { stop_tx, handle });
        tracing::info!(
            interval_secs = self.poll.interval().as_secs(),
            "scheduler started"
        );
        true
    }

    /// Signal the driver to stop and detach from it. A cycle already in
    /// progress finishes on its own; no new cycle starts. Returns `false`
    /// when nothing was running.
    pub fn stop(&self) -> bool {
        match self.running.lock().take() {
            Some(r) => {
                let _ = r.stop_tx.send(true);
                tracing::info!("scheduler stop requested");
                true
            }
            None => false,
        }
    }

    /// Signal the driver and wait up to `grace` for it to exit. A driver
    /// still busy after the grace period is aborted.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let running = self.running.lock().take();
        let Some(Running { stop_tx, mut handle }) = running else {
            return false;
        };
        let _ = stop_tx.send(true);
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(_) => tracing::info!("scheduler stopped"),
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "scheduler did not stop in time, aborting");
                handle.abort();
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            interval_secs: self.poll.interval().as_secs(),
            cycles_completed: self.poll.cycles_completed(),
            last_cycle: self.poll.last_cycle(),
        }
    }

    /// Run one cycle right now, outside the timer. Safe to call while the
    /// driver is running.
    pub async fn run_now(&self) -> CycleReport {
        self.poll.run_once(Utc::now()).await
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(r) = self.running.get_mut().take() {
            let _ = r.stop_tx.send(true);
        }
    }
}
