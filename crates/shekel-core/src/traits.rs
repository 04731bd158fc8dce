//! Trait definitions for external dependencies.
//!
//! The reconciliation pipeline never talks to PostgreSQL, the scraping
//! sidecar, the LLM or Telegram directly. It goes through these traits, so
//! tests can swap in in-memory doubles.
//!
//! # Example
//!
//! ```
//! use shekel_core::traits::TranslationCache;
//!
//! // Business logic uses traits, not concrete types
//! async fn cached<C: TranslationCache>(
//!     cache: &C,
//!     description: &str,
//! ) -> Result<Option<String>, shekel_core::AppError> {
//!     let mut hits = cache.get_many(&[description.to_string()]).await?;
//!     Ok(hits.remove(description))
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::dedup::CoarseKey;
use crate::institution::Institution;
use crate::models::{ScrapeResult, Transaction, UpsertOutcome};
use crate::tasks::Credentials;
use crate::AppError;

/// Persistent record store for transactions.
pub trait TransactionStore: Send + Sync + Clone {
    /// Returns the subset of `keys` that already exist with a non-null translation.
    ///
    /// Implementations must answer in a single round trip.
    fn find_processed(
        &self,
        keys: &[CoarseKey],
    ) -> impl Future<Output = Result<HashSet<CoarseKey>, AppError>> + Send;

    /// Inserts or updates a transaction by its narrow key.
    ///
    /// An existing translation is never replaced by `None`.
    fn upsert(
        &self,
        txn: &Transaction,
    ) -> impl Future<Output = Result<UpsertOutcome, AppError>> + Send;
}

/// Content-addressed description to translation cache.
pub trait TranslationCache: Send + Sync + Clone {
    /// Looks up many descriptions at once. Missing descriptions are absent from the map.
    fn get_many(
        &self,
        descriptions: &[String],
    ) -> impl Future<Output = Result<HashMap<String, String>, AppError>> + Send;

    /// Stores a translation. Writing a description that is already cached is a no-op.
    fn put(
        &self,
        description: &str,
        translation: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Text completion service used for batch translation.
pub trait Translator: Send + Sync + Clone {
    /// Sends one prompt and returns the raw completion text.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Chat delivery for notifications.
pub trait Notifier: Send + Sync + Clone {
    /// Sends a Markdown message to a chat channel.
    fn send(&self, channel_id: &str, text: &str)
    -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Authenticated scraping session against one institution.
pub trait Scraper: Send + Sync + Clone {
    /// Scrapes all accounts for transactions since `start_date`.
    ///
    /// Institution-side failures (bad password, blocked account) come back as
    /// [`ScrapeResult::Failure`]; transport failures as `Err`.
    fn scrape(
        &self,
        institution: Institution,
        credentials: &Credentials,
        start_date: DateTime<Utc>,
    ) -> impl Future<Output = Result<ScrapeResult, AppError>> + Send;
}
