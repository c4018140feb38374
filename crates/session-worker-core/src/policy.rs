use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sleep cadence of the polling loop, with exponential backoff on repeated scan faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep when no session is eligible.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    /// Sleep after a session was processed, letting the device recover.
    #[serde(default = "default_busy_delay_ms")]
    pub busy_delay_ms: u64,
    /// Multiplier per consecutive scan fault.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for the fault backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_idle_interval_ms() -> u64 {
    2_000
}

const fn default_busy_delay_ms() -> u64 {
    1_000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval_ms(),
            busy_delay_ms: default_busy_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl PollPolicy {
    /// Policy that never sleeps. Used to drive the loop in tests.
    pub const fn immediate() -> Self {
        Self {
            idle_interval_ms: 0,
            busy_delay_ms: 0,
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: 0,
        }
    }

    pub fn with_intervals(mut self, idle_interval_ms: u64, busy_delay_ms: u64) -> Self {
        self.idle_interval_ms = idle_interval_ms;
        self.busy_delay_ms = busy_delay_ms;
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn busy_delay(&self) -> Duration {
        Duration::from_millis(self.busy_delay_ms)
    }

    /// Sleep after `consecutive_faults` scan failures in a row (1 for the first).
    pub fn fault_backoff(&self, consecutive_faults: u32) -> Duration {
        let factor = if self.backoff_factor <= 0.0 {
            default_backoff_factor()
        } else {
            self.backoff_factor
        };
        let exp = factor.powi(consecutive_faults.saturating_sub(1) as i32);
        let base = (self.idle_interval_ms as f64 * exp).round() as u64;
        let ceiling = self.max_backoff_ms.max(self.idle_interval_ms);
        Duration::from_millis(base.min(ceiling))
    }
}
