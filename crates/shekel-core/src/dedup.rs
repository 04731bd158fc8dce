//! Record keys and the coarse deduplication filter.
//!
//! Two keys identify a transaction, and they must never be conflated:
//!
//! - [`NarrowKey`] `(date, charged_amount, description)` is the durable
//!   identity used by the upsert. Settlement changes (status, processed
//!   date) and translation updates land on the same record.
//! - [`CoarseKey`] adds `processed_date` and `status`. A candidate is skipped
//!   for the current run only when a stored record matches its coarse key
//!   *and* already carries a translation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{Transaction, TransactionStatus};
use crate::traits::TransactionStore;
use crate::AppError;

/// An `f64` amount compared by exact value.
///
/// `-0.0` and `0.0` produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmountKey(u64);

impl AmountKey {
    pub fn new(amount: f64) -> Self {
        let normalized = if amount == 0.0 { 0.0 } else { amount };
        Self(normalized.to_bits())
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<f64> for AmountKey {
    fn from(amount: f64) -> Self {
        Self::new(amount)
    }
}

/// Durable identity of a stored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NarrowKey {
    pub date: DateTime<Utc>,
    pub charged_amount: AmountKey,
    pub description: String,
}

/// Skip-this-run test key. See the module docs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoarseKey {
    pub date: DateTime<Utc>,
    pub charged_amount: AmountKey,
    pub description: String,
    pub processed_date: DateTime<Utc>,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn narrow_key(&self) -> NarrowKey {
        NarrowKey {
            date: self.date,
            charged_amount: AmountKey::new(self.charged_amount),
            description: self.description.clone(),
        }
    }

    pub fn coarse_key(&self) -> CoarseKey {
        CoarseKey {
            date: self.date,
            charged_amount: AmountKey::new(self.charged_amount),
            description: self.description.clone(),
            processed_date: self.processed_date,
            status: self.status,
        }
    }
}

/// Drops every candidate whose coarse key is in `processed`, keeping order.
pub fn retain_unprocessed(
    candidates: Vec<Transaction>,
    processed: &HashSet<CoarseKey>,
) -> Vec<Transaction> {
    if processed.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|txn| !processed.contains(&txn.coarse_key()))
        .collect()
}

/// Returns the candidates that still need translation or persistence.
///
/// Costs exactly one store round trip, or none for an empty input.
pub async fn select_for_processing<S: TransactionStore>(
    store: &S,
    candidates: Vec<Transaction>,
) -> Result<Vec<Transaction>, AppError> {
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let keys: Vec<CoarseKey> = candidates.iter().map(Transaction::coarse_key).collect();
    let processed = store.find_processed(&keys).await?;

    tracing::debug!(
        candidates = candidates.len(),
        processed = processed.len(),
        "Coarse filter lookup complete"
    );

    Ok(retain_unprocessed(candidates, &processed))
}
