//! Sync statistics and batch summaries.
//!
//! Pure bookkeeping, decoupled from I/O and from the pipeline itself.

use crate::models::UpsertOutcome;

/// Outcome of reconciling a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Already stored with the same coarse key and a translation; skipped.
    Unchanged,
    /// Existing record updated in place.
    Updated,
    /// New record inserted.
    Created,
}

impl From<UpsertOutcome> for SyncOutcome {
    fn from(outcome: UpsertOutcome) -> Self {
        match outcome {
            UpsertOutcome::Inserted(_) => SyncOutcome::Created,
            UpsertOutcome::Updated(_) => SyncOutcome::Updated,
        }
    }
}

/// Statistics for one task run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub unchanged: usize,
    pub updated: usize,
    pub created: usize,
    /// Created records whose notification could not be delivered.
    pub notifications_failed: usize,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Created => self.created += 1,
        }
    }

    /// Returns the total number of scraped transactions accounted for.
    pub fn total(&self) -> usize {
        self.unchanged + self.updated + self.created
    }
}

/// Result of one task inside a batch run.
#[derive(Debug, Clone)]
pub struct TaskSyncResult {
    pub task_key: String,
    pub stats: SyncStats,
    pub error: Option<String>,
}

impl TaskSyncResult {
    pub fn success(task_key: String, stats: SyncStats) -> Self {
        Self {
            task_key,
            stats,
            error: None,
        }
    }

    pub fn failure(task_key: String, error: String) -> Self {
        Self {
            task_key,
            stats: SyncStats::default(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated results of running every task in the registry once.
#[derive(Debug, Clone, Default)]
pub struct BatchSyncSummary {
    pub results: Vec<TaskSyncResult>,
}

impl BatchSyncSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: TaskSyncResult) {
        self.results.push(result);
    }

    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Sum of created records across successful tasks.
    pub fn total_created(&self) -> usize {
        self.results.iter().map(|r| r.stats.created).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.results.iter().map(|r| r.stats.updated).sum()
    }

    pub fn total_tasks(&self) -> usize {
        self.results.len()
    }
}
