//! Shekel Core - Domain types, reconciliation pipeline and retry policies.
//!
//! This crate provides the core functionality for Shekel Streamer, including:
//!
//! - **Domain models**: [`Transaction`], [`RawTransaction`], [`Institution`], [`SyncTask`]
//! - **Deduplication**: [`NarrowKey`] for record identity, [`CoarseKey`] for the skip test
//! - **Services**: [`SyncService`] for the reconciliation pipeline,
//!   [`TranslationService`] for cached batch translation,
//!   [`NotificationService`] for chat delivery
//! - **Resilience**: [`RetryPolicy`] with exponential or fixed backoff and jitter
//! - **Traits**: [`TransactionStore`], [`TranslationCache`], [`Translator`],
//!   [`Notifier`] and [`Scraper`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O through traits. `shekel-db` provides
//! the PostgreSQL store and cache, `shekel-client` the HTTP adapters, and the
//! `shekel-streamer` binary wires them together on a cron schedule.
//!
//! # Example
//!
//! ```ignore
//! use shekel_core::{NotificationService, SyncConfig, SyncService, TranslationService};
//! use shekel_core::progress::TracingReporter;
//!
//! let translation = TranslationService::new(cache, openai, template);
//! let notification = NotificationService::new(Some(telegram), config.timezone);
//! let sync = SyncService::new(store, scraper, translation, notification, SyncConfig::default());
//!
//! let summary = sync.run_all_with_progress(&registry, &TracingReporter).await;
//! println!("{} new transactions", summary.total_created());
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod institution;
pub mod models;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod sync;
pub mod tasks;
pub mod traits;
pub mod translation;

// Configuration
pub use config::{DEFAULT_TIMEZONE, DbConfig, HttpConfig, SyncConfig, TableNames, parse_timezone};

// Error handling
pub use error::AppError;

// Domain models
pub use institution::Institution;
pub use models::{
    Installments, RawTransaction, ScrapeResult, ScrapedAccount, Transaction, TransactionStatus,
    TransactionType, UpsertOutcome,
};

// Deduplication
pub use dedup::{AmountKey, CoarseKey, NarrowKey, retain_unprocessed, select_for_processing};

// Tasks
pub use tasks::{
    Credentials, SyncTask, TaskEntry, TaskRegistry, TasksConfig, default_tasks_path,
    load_tasks_config,
};

// Sync types
pub use sync::{BatchSyncSummary, SyncOutcome, SyncStats, TaskSyncResult};

// Progress reporting
pub use progress::{ProgressReporter, SilentReporter, SyncEvent, TracingReporter};

// Retry
pub use retry::{Backoff, Jitter, RetryExhausted, RetryPolicy};

// Traits for dependency injection
pub use traits::{Notifier, Scraper, TransactionStore, TranslationCache, Translator};

// Services (generic over trait implementations)
pub use notification::{Delivery, NotificationService, format_amount, format_notification};
pub use pipeline::{SyncService, normalize, scrape_start_date};
pub use translation::{PLACEHOLDER, PromptTemplate, TranslationService, parse_batch_response};
