//! Progress Aggregator
//!
//! Folds the two progress dimensions of an import (which step, and how far
//! through it) into one snapshot with derived fractions:
//!
//! ```text
//! step_percent  = step_progress / step_total
//! total_percent = (step_number + step_percent) / step_count
//! ```
//!
//! Degenerate inputs never produce `NaN`: a zero `step_total` gives a
//! `step_percent` of 0.0 and a zero `step_count` gives a `total_percent` of
//! 0.0. Because entry numbers are 1-based, `total_percent` of the last step
//! runs past 1.0; observers that draw a bar should clamp.

use std::sync::Arc;
use tracing::trace;

/// Raw counters observed after a batch write or a wipe page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    /// Table name while importing, `wipe` while deleting
    pub step_name: String,
    pub step_number: u64,
    pub step_count: u64,
    pub step_progress: u64,
    pub step_total: u64,
}

/// Counters plus derived completion fractions
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub step_name: String,
    pub step_number: u64,
    pub step_count: u64,
    pub step_progress: u64,
    pub step_total: u64,
    pub step_percent: f64,
    pub total_percent: f64,
}

/// Pure aggregation of one set of counters
pub fn aggregate(step: StepProgress) -> ProgressSnapshot {
    let step_percent = if step.step_total == 0 {
        0.0
    } else {
        step.step_progress as f64 / step.step_total as f64
    };

    let total_percent = if step.step_count == 0 {
        0.0
    } else {
        (step.step_number as f64 + step_percent) / step.step_count as f64
    };

    ProgressSnapshot {
        step_name: step.step_name,
        step_number: step.step_number,
        step_count: step.step_count,
        step_progress: step.step_progress,
        step_total: step.step_total,
        step_percent,
        total_percent,
    }
}

/// Receives snapshots inline on the writer's path; must return quickly
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Aggregates counters and forwards them to the registered observer, if any
#[derive(Clone, Default)]
pub struct ProgressReporter {
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ProgressReporter {
    pub fn new(observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, step: StepProgress) {
        let snapshot = aggregate(step);
        trace!(
            step = %snapshot.step_name,
            step_number = snapshot.step_number,
            step_percent = snapshot.step_percent,
            total_percent = snapshot.total_percent,
            "Progress"
        );
        if let Some(observer) = &self.observer {
            observer.on_progress(&snapshot);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
