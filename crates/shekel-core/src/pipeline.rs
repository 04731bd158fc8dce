//! Reconciliation pipeline.
//!
//! One task run goes through:
//!
//! ```text
//! FETCH -> NORMALIZE+SORT -> COARSE_FILTER -> (CHUNK -> TRANSLATE -> (UPSERT -> maybe NOTIFY)*)* -> DONE
//! ```
//!
//! The [`SyncService`] is generic over every external collaborator:
//! - [`TransactionStore`] - record persistence
//! - [`Scraper`] - institution sessions
//! - [`TranslationCache`] and [`Translator`] - description translation
//! - [`Notifier`] - chat delivery
//!
//! Tasks run one at a time. Within a task, every I/O call is awaited before
//! the next one starts, so upserts and notifications follow event date order.
//!
//! Notification happens only after an upsert reports [`UpsertOutcome::Inserted`].
//! Together with the narrow-key upsert this makes re-running over an
//! overlapping window safe: records seen before are updated, never re-notified.

use chrono::{DateTime, Duration, Utc};

use crate::dedup::select_for_processing;
use crate::models::{ScrapeResult, ScrapedAccount, Transaction, UpsertOutcome};
use crate::notification::{Delivery, NotificationService};
use crate::progress::{ProgressReporter, SilentReporter, SyncEvent};
use crate::sync::{BatchSyncSummary, SyncOutcome, SyncStats, TaskSyncResult};
use crate::tasks::{SyncTask, TaskRegistry};
use crate::traits::{Notifier, Scraper, TransactionStore, TranslationCache, Translator};
use crate::translation::TranslationService;
use crate::{AppError, SyncConfig};

/// First instant of the scraping window.
pub fn scrape_start_date(now: DateTime<Utc>, lookback_days: i64) -> DateTime<Utc> {
    now - Duration::days(lookback_days)
}

/// Flattens scraped accounts into transactions, sorted ascending by event date.
///
/// The sort is stable: same-date transactions keep their upstream order.
pub fn normalize(task: &SyncTask, accounts: Vec<ScrapedAccount>) -> Vec<Transaction> {
    let mut txns: Vec<Transaction> = accounts
        .into_iter()
        .flat_map(|account| {
            let account_number = account.account_number;
            account
                .txns
                .into_iter()
                .map(move |raw| Transaction {
                    account_number: account_number.clone(),
                    date: raw.date,
                    processed_date: raw.processed_date,
                    description: raw.description,
                    memo: raw.memo,
                    translated_description: None,
                    original_amount: raw.original_amount,
                    original_currency: raw.original_currency,
                    charged_amount: raw.charged_amount,
                    txn_type: raw.txn_type,
                    status: raw.status,
                    identifier: raw.identifier,
                    installments: raw.installments,
                    category: raw.category,
                    institution: task.institution,
                    user_code: task.user.clone(),
                    channel_id: task.channel_id.clone(),
                })
        })
        .collect();

    txns.sort_by_key(|t| t.date);
    txns
}

/// Reconciles scraped transactions with the store and notifies on new records.
pub struct SyncService<S, P, C, T, N>
where
    S: TransactionStore,
    P: Scraper,
    C: TranslationCache,
    T: Translator,
    N: Notifier,
{
    store: S,
    scraper: P,
    translation: TranslationService<C, T>,
    notification: NotificationService<N>,
    config: SyncConfig,
}

impl<S, P, C, T, N> Clone for SyncService<S, P, C, T, N>
where
    S: TransactionStore,
    P: Scraper,
    C: TranslationCache,
    T: Translator,
    N: Notifier,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scraper: self.scraper.clone(),
            translation: self.translation.clone(),
            notification: self.notification.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, P, C, T, N> SyncService<S, P, C, T, N>
where
    S: TransactionStore,
    P: Scraper,
    C: TranslationCache,
    T: Translator,
    N: Notifier,
{
    pub fn new(
        store: S,
        scraper: P,
        translation: TranslationService<C, T>,
        notification: NotificationService<N>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            scraper,
            translation,
            notification,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one task without progress reporting.
    pub async fn run_task(&self, task: &SyncTask) -> Result<SyncStats, AppError> {
        self.run_task_with_progress(task, &SilentReporter).await
    }

    /// Runs one task, emitting progress events.
    ///
    /// Fails on a scrape failure (nothing persisted) or on the first store
    /// error (records already persisted stay persisted). Translation and
    /// notification failures never fail the task.
    pub async fn run_task_with_progress<R: ProgressReporter>(
        &self,
        task: &SyncTask,
        reporter: &R,
    ) -> Result<SyncStats, AppError> {
        let task_key = task.key();
        let mut stats = SyncStats::new();

        let start_date = scrape_start_date(Utc::now(), self.config.lookback_days);
        tracing::debug!(task = %task_key, %start_date, "Scraping window");

        let accounts = match self
            .scraper
            .scrape(task.institution, &task.credentials, start_date)
            .await?
        {
            ScrapeResult::Success { accounts } => accounts,
            ScrapeResult::Failure {
                error_type,
                error_message,
            } => {
                return Err(AppError::ScrapeFailed {
                    error_type,
                    message: error_message,
                });
            }
        };

        let scraped = normalize(task, accounts);
        reporter.report(SyncEvent::Scraped {
            task_key: &task_key,
            found: scraped.len(),
        });
        if scraped.is_empty() {
            return Ok(stats);
        }

        let scraped_count = scraped.len();
        let pending = select_for_processing(&self.store, scraped).await?;
        stats.unchanged = scraped_count - pending.len();
        reporter.report(SyncEvent::Filtered {
            task_key: &task_key,
            candidates: scraped_count,
            skipped: stats.unchanged,
        });

        let chunk_size = self.config.chunk_size.max(1);
        let total_chunks = pending.len().div_ceil(chunk_size);

        for (chunk_index, chunk) in pending.chunks(chunk_size).enumerate() {
            let translations = self.translation.translate(chunk).await;
            reporter.report(SyncEvent::ChunkTranslated {
                task_key: &task_key,
                chunk_index,
                total_chunks,
                size: chunk.len(),
                translated: translations.iter().filter(|t| t.is_some()).count(),
            });

            for (txn, translated) in chunk.iter().zip(translations) {
                let mut txn = txn.clone();
                txn.translated_description = translated;

                let outcome = self.store.upsert(&txn).await?;
                stats.record(SyncOutcome::from(outcome));

                if let UpsertOutcome::Inserted(id) = outcome {
                    if self.notification.notify(&txn, id).await == Delivery::Failed {
                        stats.notifications_failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Runs every task in registry order without progress reporting.
    pub async fn run_all(&self, registry: &TaskRegistry) -> BatchSyncSummary {
        self.run_all_with_progress(registry, &SilentReporter).await
    }

    /// Runs every task in registry order. A failing task never stops the others.
    pub async fn run_all_with_progress<R: ProgressReporter>(
        &self,
        registry: &TaskRegistry,
        reporter: &R,
    ) -> BatchSyncSummary {
        let mut summary = BatchSyncSummary::new();
        let total = registry.len();

        reporter.report(SyncEvent::BatchStarted { total_tasks: total });

        for (i, task) in registry.tasks().iter().enumerate() {
            let task_key = task.key();
            reporter.report(SyncEvent::TaskStarted {
                task_index: i,
                total_tasks: total,
                task_key: &task_key,
            });

            match self.run_task_with_progress(task, reporter).await {
                Ok(stats) => {
                    reporter.report(SyncEvent::TaskCompleted {
                        task_key: &task_key,
                        stats: &stats,
                    });
                    summary.add(TaskSyncResult::success(task_key, stats));
                }
                Err(e) => {
                    let error_str = e.to_string();
                    reporter.report(SyncEvent::TaskFailed {
                        task_key: &task_key,
                        error: &error_str,
                    });
                    summary.add(TaskSyncResult::failure(task_key, error_str));
                }
            }
        }

        reporter.report(SyncEvent::BatchCompleted { summary: &summary });

        summary
    }
}
