use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Poll loop configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the background due-check/dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Start the poll loop when the server boots.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Seconds between two scan cycles.
    #[serde(default = "d_30")]
    pub poll_interval_secs: u64,
    /// Maximum dispatches running at once, across all cycles.  Clamped to the
    /// range `1..=64`.
    #[serde(default = "d_8")]
    pub max_concurrent_dispatches: usize,
    /// Timeout applied to each external call (weather fetch, delivery).
    #[serde(default = "d_10000")]
    pub call_timeout_ms: u64,
    /// How long shutdown waits for an in-flight cycle before detaching.
    #[serde(default = "d_5000")]
    pub stop_grace_ms: u64,
    /// Consecutive due-check data errors after which an entry is reported
    /// as quarantined.  Quarantined entries are still retried every cycle.
    #[serde(default = "d_3")]
    pub quarantine_after: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 30,
            max_concurrent_dispatches: 8,
            call_timeout_ms: 10_000,
            stop_grace_ms: 5_000,
            quarantine_after: 3,
        }
    }
}

impl SchedulerConfig {
    /// Clamp `max_concurrent_dispatches` to `1..=64` and keep the
    /// quarantine threshold at one or above.
    pub fn clamped(&self) -> Self {
        Self {
            max_concurrent_dispatches: self.max_concurrent_dispatches.clamp(1, 64),
            quarantine_after: self.quarantine_after.max(1),
            ..self.clone()
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_30() -> u64 {
    30
}
fn d_8() -> usize {
    8
}
fn d_10000() -> u64 {
    10_000
}
fn d_5000() -> u64 {
    5_000
}
fn d_3() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_thirty_seconds() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.poll_interval_secs, 30);
        assert!(cfg.enabled);
    }

    #[test]
    fn clamp_below_min() {
        let cfg = SchedulerConfig {
            max_concurrent_dispatches: 0,
            quarantine_after: 0,
            ..Default::default()
        };
        let clamped = cfg.clamped();
        assert_eq!(clamped.max_concurrent_dispatches, 1);
        assert_eq!(clamped.quarantine_after, 1);
    }

    #[test]
    fn clamp_above_max() {
        let cfg = SchedulerConfig {
            max_concurrent_dispatches: 1000,
            ..Default::default()
        };
        assert_eq!(cfg.clamped().max_concurrent_dispatches, 64);
    }
}
