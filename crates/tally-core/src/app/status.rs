//! Status - 処理統計
//!
//! 各 disposition の件数を atomic カウンタで数えます。
//! WorkerGroup 内の全ループで 1 つの ProcessingStats を共有できます。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::Disposition;

#[derive(Debug, Default)]
pub struct ProcessingStats {
    completed: AtomicU64,
    rescheduled: AtomicU64,
    abandoned: AtomicU64,
    dead_lettered: AtomicU64,
    held: AtomicU64,
    poll_errors: AtomicU64,
    disposition_errors: AtomicU64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, disposition: &Disposition) {
        let counter = match disposition {
            Disposition::Completed => &self.completed,
            Disposition::Rescheduled { .. } => &self.rescheduled,
            Disposition::Abandoned => &self.abandoned,
            Disposition::DeadLettered(_) => &self.dead_lettered,
            Disposition::Held { .. } => &self.held,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// The gateway refused a disposition call (complete, reschedule, ...).
    pub fn record_disposition_error(&self) {
        self.disposition_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            rescheduled: self.rescheduled.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            held: self.held.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            disposition_errors: self.disposition_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub rescheduled: u64,
    pub abandoned: u64,
    pub dead_lettered: u64,
    pub held: u64,
    pub poll_errors: u64,
    pub disposition_errors: u64,
}

impl StatsSnapshot {
    /// Envelopes that received a disposition.
    pub fn processed(&self) -> u64 {
        self.completed + self.rescheduled + self.abandoned + self.dead_lettered + self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeadLetterReason;

    #[test]
    fn counts_each_disposition() {
        let stats = ProcessingStats::new();
        stats.record(&Disposition::Completed);
        stats.record(&Disposition::Completed);
        stats.record(&Disposition::Abandoned);
        stats.record(&Disposition::DeadLettered(DeadLetterReason::MalformedPayload));
        stats.record_poll_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.abandoned, 1);
        assert_eq!(snapshot.dead_lettered, 1);
        assert_eq!(snapshot.poll_errors, 1);
        assert_eq!(snapshot.processed(), 4);
    }
}
