//! Process-wide monitor state
//!
//! Created once at startup. The monitoring agent reports finished cycles
//! through [`MonitorState::record_cycle`]; request handlers only read.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Timing of one completed monitoring cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct MonitorState {
    start_time: DateTime<Utc>,
    last_cycle: RwLock<Option<CycleRecord>>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            last_cycle: RwLock::new(None),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Seconds elapsed since startup at `now`
    pub fn uptime_at(&self, now: DateTime<Utc>) -> f64 {
        (now - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn record_cycle(&self, started_at: DateTime<Utc>, duration: Duration) {
        let mut guard = self.last_cycle.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CycleRecord {
            started_at,
            duration,
        });
    }

    pub fn last_cycle(&self) -> Option<CycleRecord> {
        *self.last_cycle.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}
