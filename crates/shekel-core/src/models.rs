//! Domain models for scraped and persisted transactions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::institution::Institution;

/// Settlement status reported by the institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(AppError::Generic(format!("invalid transaction status: {}", s))),
        }
    }
}

/// Kind of charge: a regular one, or one payment of an installment plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Normal,
    Installments,
}

impl TransactionType {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Normal => "normal",
            TransactionType::Installments => "installments",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "installments" => Ok(Self::Installments),
            _ => Err(AppError::Generic(format!("invalid transaction type: {}", s))),
        }
    }
}

/// Position of a charge inside an installment plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installments {
    pub number: u32,
    pub total: u32,
}

/// A transaction as returned by the scraping session, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub date: DateTime<Utc>,
    pub processed_date: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub original_amount: f64,
    pub original_currency: String,
    pub charged_amount: f64,
    #[serde(rename = "type", default)]
    pub txn_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub installments: Option<Installments>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Upstream identifiers arrive either as numbers or as strings.
fn deserialize_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIdentifier {
        Number(serde_json::Number),
        Text(String),
    }

    Ok(
        Option::<RawIdentifier>::deserialize(deserializer)?.map(|raw| match raw {
            RawIdentifier::Number(n) => n.to_string(),
            RawIdentifier::Text(s) => s,
        }),
    )
}

/// All transactions of one account returned by a scraping session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedAccount {
    pub account_number: String,
    #[serde(default)]
    pub txns: Vec<RawTransaction>,
}

/// Outcome of one scraping session.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeResult {
    Success { accounts: Vec<ScrapedAccount> },
    Failure {
        error_type: String,
        error_message: String,
    },
}

/// A normalized transaction, ready for reconciliation against the store.
///
/// `created_at` and `updated_at` are deliberately absent: the store assigns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub account_number: String,
    pub date: DateTime<Utc>,
    pub processed_date: DateTime<Utc>,
    pub description: String,
    pub memo: Option<String>,
    pub translated_description: Option<String>,
    pub original_amount: f64,
    /// Upstream sometimes reports the account currency here for foreign charges.
    pub original_currency: String,
    /// May equal `original_amount` even when currencies differ. Kept as reported.
    pub charged_amount: f64,
    pub txn_type: TransactionType,
    pub status: TransactionStatus,
    pub identifier: Option<String>,
    pub installments: Option<Installments>,
    pub category: Option<String>,
    pub institution: Institution,
    pub user_code: String,
    pub channel_id: Option<String>,
}

impl Transaction {
    /// Text sent for translation: the description, with the memo appended when present.
    ///
    /// Line breaks are folded to single spaces so the text fits on one line
    /// of a numbered translation request.
    pub fn translation_source(&self) -> String {
        let description = single_line(&self.description);
        match self.memo.as_deref().map(single_line).filter(|m| !m.is_empty()) {
            Some(memo) => format!("{} - {}", description, memo),
            None => description,
        }
    }

    /// True for income, false for expenses (and zero-amount records).
    pub fn is_income(&self) -> bool {
        self.charged_amount > 0.0
    }
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of an idempotent upsert by narrow key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record with this narrow key existed; a new one was created.
    Inserted(Uuid),
    /// An existing record was updated in place.
    Updated(Uuid),
}

impl UpsertOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => *id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}
