//! Progress reporting for sync runs.
//!
//! The pipeline emits [`SyncEvent`]s instead of logging directly, so a CLI,
//! a test or a future server can decide how to present them.

use tracing::{error, info, warn};

use crate::sync::{BatchSyncSummary, SyncStats};

/// Events emitted while reconciling tasks.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    /// A batch run over the whole registry started.
    BatchStarted { total_tasks: usize },
    /// A task started.
    TaskStarted {
        task_index: usize,
        total_tasks: usize,
        task_key: &'a str,
    },
    /// The scraping session returned.
    Scraped { task_key: &'a str, found: usize },
    /// The coarse filter ran.
    Filtered {
        task_key: &'a str,
        candidates: usize,
        skipped: usize,
    },
    /// A chunk finished translating and is about to be persisted.
    ChunkTranslated {
        task_key: &'a str,
        chunk_index: usize,
        total_chunks: usize,
        size: usize,
        translated: usize,
    },
    /// A task finished successfully.
    TaskCompleted {
        task_key: &'a str,
        stats: &'a SyncStats,
    },
    /// A task failed; sibling tasks still run.
    TaskFailed { task_key: &'a str, error: &'a str },
    /// The batch run finished.
    BatchCompleted { summary: &'a BatchSyncSummary },
}

/// Receives progress events.
pub trait ProgressReporter: Send + Sync {
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Tracing-based reporter for CLI logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::BatchStarted { total_tasks } => {
                info!(total_tasks, "Sync run started");
            }
            SyncEvent::TaskStarted {
                task_index,
                total_tasks,
                task_key,
            } => {
                info!(
                    task = task_key,
                    "[{}/{}] Scraping started",
                    task_index + 1,
                    total_tasks
                );
            }
            SyncEvent::Scraped { task_key, found } => {
                if found == 0 {
                    info!(task = task_key, "No transactions found");
                } else {
                    info!(task = task_key, found, "Transactions scraped");
                }
            }
            SyncEvent::Filtered {
                task_key,
                candidates,
                skipped,
            } => {
                info!(task = task_key, candidates, skipped, "Existing transactions filtered");
            }
            SyncEvent::ChunkTranslated {
                task_key,
                chunk_index,
                total_chunks,
                size,
                translated,
            } => {
                tracing::debug!(
                    task = task_key,
                    size,
                    translated,
                    "Chunk {}/{} translated",
                    chunk_index + 1,
                    total_chunks
                );
            }
            SyncEvent::TaskCompleted { task_key, stats } => {
                info!(
                    task = task_key,
                    created = stats.created,
                    updated = stats.updated,
                    unchanged = stats.unchanged,
                    "Scraping finished"
                );
                if stats.notifications_failed > 0 {
                    warn!(
                        task = task_key,
                        failed = stats.notifications_failed,
                        "Some notifications were not delivered"
                    );
                }
            }
            SyncEvent::TaskFailed { task_key, error } => {
                error!(task = task_key, error, "Task failed");
            }
            SyncEvent::BatchCompleted { summary } => {
                info!(
                    tasks = summary.total_tasks(),
                    succeeded = summary.successful_count(),
                    failed = summary.failed_count(),
                    created = summary.total_created(),
                    updated = summary.total_updated(),
                    "Sync run finished"
                );
            }
        }
    }
}
