//! Aggregate report for a full-universe run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FailureKind, ScreenOutcome};

/// Counters folded from every symbol outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Symbols in the universe at the start of the run
    pub total: usize,
    /// Symbols whose pipeline ran to an outcome, including failures
    pub processed: usize,
    /// Symbols newly added to the radar
    pub breakouts: usize,
    pub no_data: usize,
    pub errors: usize,
    /// Symbols not screened because the run was cancelled
    pub skipped: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl AggregateReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            breakouts: 0,
            no_data: 0,
            errors: 0,
            skipped: 0,
            cancelled: false,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Fold one symbol outcome into the counters.
    pub fn record(&mut self, outcome: &ScreenOutcome) {
        match outcome {
            ScreenOutcome::Screened { added_to_radar, .. } => {
                self.processed += 1;
                if *added_to_radar {
                    self.breakouts += 1;
                }
            }
            ScreenOutcome::NoData { .. } => {
                self.processed += 1;
                self.no_data += 1;
            }
            ScreenOutcome::Failed { kind, .. } => match kind {
                FailureKind::Cancelled => self.skipped += 1,
                FailureKind::Panicked => self.errors += 1,
                _ => {
                    self.processed += 1;
                    self.errors += 1;
                }
            },
        }
    }

    /// A worker task that could not be joined.
    pub fn record_lost_task(&mut self) {
        self.errors += 1;
    }

    pub fn mark_cancelled(&mut self, unstarted: usize) {
        self.cancelled = true;
        self.skipped += unstarted;
    }

    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }
}
