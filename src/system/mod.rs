//! # System Module - Periodic Whole-System Events
//!
//! System events are not predicted from particle state: they fire at fixed
//! simulation-time cadences, pre-empting the particle event queue. The
//! scheduler keeps them outside the sorter and compares the earliest timer
//! against the earliest particle event on every step.
//!
//! Two kinds exist: the progress *ticker* (observers update running
//! statistics) and the *snapshot* (the driver synchronises every particle
//! and copies the state out).

use serde::{Deserialize, Serialize};

/// What a system timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemTaskKind {
    /// Observer bookkeeping tick.
    Ticker,
    /// Full-state snapshot for output.
    Snapshot,
}

/// A periodic system event.
#[derive(Debug, Clone)]
pub struct SystemTimer {
    /// Human-readable name for diagnostics.
    pub name: String,
    /// What firing does.
    pub kind: SystemTaskKind,
    /// Absolute simulation time of the next firing.
    pub next: f64,
    /// Firing period.
    pub period: f64,
}

impl SystemTimer {
    /// Creates a timer firing every `period` from `start`. Non-positive
    /// periods fall back to the unit time.
    pub fn new(name: impl Into<String>, kind: SystemTaskKind, period: f64, start: f64) -> Self {
        let period = if period <= 0.0 { 1.0 } else { period };
        SystemTimer {
            name: name.into(),
            kind,
            next: start + period,
            period,
        }
    }

    /// Re-arms the timer after it fires.
    pub fn reschedule(&mut self) {
        self.next += self.period;
    }

    /// Re-arms the timer relative to `time`, discarding its phase. Used
    /// when the schedule is rebuilt wholesale.
    pub fn rebase(&mut self, time: f64) {
        self.next = time + self.period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_one_period_after_start() {
        let timer = SystemTimer::new("ticker", SystemTaskKind::Ticker, 2.5, 10.0);
        assert_eq!(timer.next, 12.5);
    }

    #[test]
    fn reschedule_steps_by_whole_periods() {
        let mut timer = SystemTimer::new("snap", SystemTaskKind::Snapshot, 1.0, 0.0);
        timer.reschedule();
        timer.reschedule();
        assert_eq!(timer.next, 3.0);
    }

    #[test]
    fn non_positive_period_defaults_to_unit_time() {
        let timer = SystemTimer::new("ticker", SystemTaskKind::Ticker, 0.0, 0.0);
        assert_eq!(timer.period, 1.0);
    }

    #[test]
    fn rebase_discards_phase() {
        let mut timer = SystemTimer::new("snap", SystemTaskKind::Snapshot, 4.0, 0.0);
        timer.rebase(10.5);
        assert_eq!(timer.next, 14.5);
    }
}
