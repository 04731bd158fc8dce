//! Scheduled sync runs.

use std::sync::Arc;

use shekel_core::{
    AppError, BatchSyncSummary, Notifier, Scraper, SyncService, TaskRegistry, TracingReporter,
    TransactionStore, TranslationCache, Translator,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Accepts 5-field (minute-first) or 6-field (second-first) cron expressions
/// and returns the 6-field form the scheduler expects.
pub fn normalize_cron(expr: &str) -> Result<String, AppError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 => Ok(fields.join(" ")),
        n => Err(AppError::ConfigError(format!(
            "TRANSACTION_SYNC_SCHEDULE must have 5 or 6 fields, got {}: '{}'",
            n, expr
        ))),
    }
}

/// Runs the whole registry on demand, never two runs at once.
///
/// Clones share the same lock and shutdown token, so a scheduler tick that
/// fires while a run is still in progress is skipped rather than queued.
pub struct SyncRunner<S, P, C, T, N>
where
    S: TransactionStore,
    P: Scraper,
    C: TranslationCache,
    T: Translator,
    N: Notifier,
{
    service: SyncService<S, P, C, T, N>,
    registry: Arc<TaskRegistry>,
    running: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl<S, P, C, T, N> Clone for SyncRunner<S, P, C, T, N>
where
    S: TransactionStore,
    P: Scraper,
    C: TranslationCache,
    T: Translator,
    N: Notifier,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            registry: Arc::clone(&self.registry),
            running: Arc::clone(&self.running),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S, P, C, T, N> SyncRunner<S, P, C, T, N>
where
    S: TransactionStore,
    P: Scraper,
    C: TranslationCache,
    T: Translator,
    N: Notifier,
{
    pub fn new(service: SyncService<S, P, C, T, N>, registry: TaskRegistry) -> Self {
        Self {
            service,
            registry: Arc::new(registry),
            running: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs every task once. Returns `None` when the run was skipped.
    pub async fn run(&self, trigger: &str) -> Option<BatchSyncSummary> {
        if self.shutdown.is_cancelled() {
            debug!(trigger, "Shutting down, sync run not started");
            return None;
        }

        let Ok(_guard) = self.running.try_lock() else {
            warn!(trigger, "Previous sync run still in progress, skipping");
            return None;
        };

        debug!(trigger, "Sync run triggered");
        Some(
            self.service
                .run_all_with_progress(&self.registry, &TracingReporter)
                .await,
        )
    }

    /// Stops new runs from starting and waits for the in-flight one, if any.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let _guard = self.running.lock().await;
    }
}
