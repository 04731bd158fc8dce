//! Transaction repository for PostgreSQL.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use shekel_core::{
    AmountKey, AppError, CoarseKey, Installments, Institution, NarrowKey, TableNames, Transaction,
    TransactionStatus, UpsertOutcome,
};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const TRANSACTION_COLUMNS: &str = "id, account_number, date, processed_date, description, memo, translated_description, original_amount, original_currency, charged_amount, txn_type, status, identifier, installment_number, installment_total, category, company_id, user_code, channel_id, created_at, updated_at";

/// A stored transaction with its store-assigned fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub transaction: Transaction,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Repository for transaction records.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use shekel_core::TableNames;
/// use shekel_db::TransactionRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/shekel")
///     .await?;
///
/// let repo = TransactionRepository::new(pool, &TableNames::default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransactionRepository {
    pool: Pool<Postgres>,
    table: String,
}

impl TransactionRepository {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            table: tables.transactions().to_string(),
        }
    }

    /// Returns the coarse keys among `keys` that are stored with a non-null translation.
    ///
    /// The keys travel as five parallel arrays and are joined with UNNEST, so
    /// the whole lookup is one query regardless of batch size.
    pub async fn find_processed(&self, keys: &[CoarseKey]) -> Result<HashSet<CoarseKey>, AppError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let dates: Vec<DateTime<Utc>> = keys.iter().map(|k| k.date).collect();
        let amounts: Vec<f64> = keys.iter().map(|k| k.charged_amount.value()).collect();
        let descriptions: Vec<String> = keys.iter().map(|k| k.description.clone()).collect();
        let processed: Vec<DateTime<Utc>> = keys.iter().map(|k| k.processed_date).collect();
        let statuses: Vec<String> = keys.iter().map(|k| k.status.as_str().to_string()).collect();

        let query = format!(
            r#"
            SELECT DISTINCT t.date, t.charged_amount, t.description, t.processed_date, t.status
            FROM {} t
            JOIN UNNEST($1::timestamptz[], $2::float8[], $3::text[], $4::timestamptz[], $5::text[])
                AS k(date, charged_amount, description, processed_date, status)
              ON t.date = k.date
             AND t.charged_amount = k.charged_amount
             AND t.description = k.description
             AND t.processed_date = k.processed_date
             AND t.status = k.status
            WHERE t.translated_description IS NOT NULL
            "#,
            self.table
        );

        let rows: Vec<CoarseKeyRow> = sqlx::query_as(&query)
            .bind(&dates)
            .bind(&amounts)
            .bind(&descriptions)
            .bind(&processed)
            .bind(&statuses)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        rows.into_iter().map(CoarseKeyRow::into_key).collect()
    }

    /// Inserts or updates a transaction by narrow key in a single statement.
    ///
    /// On conflict every mutable field is overwritten except that a stored
    /// translation is never replaced by NULL. `created_at` is kept and
    /// `updated_at` stamped. `xmax = 0` only holds for freshly inserted rows.
    pub async fn upsert(&self, txn: &Transaction) -> Result<UpsertOutcome, AppError> {
        let query = format!(
            r#"
            INSERT INTO {table} (
                account_number,
                date,
                processed_date,
                description,
                memo,
                translated_description,
                original_amount,
                original_currency,
                charged_amount,
                txn_type,
                status,
                identifier,
                installment_number,
                installment_total,
                category,
                company_id,
                user_code,
                channel_id,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, NOW())
            ON CONFLICT (date, charged_amount, description)
            DO UPDATE SET
                account_number = EXCLUDED.account_number,
                processed_date = EXCLUDED.processed_date,
                memo = EXCLUDED.memo,
                translated_description = COALESCE(EXCLUDED.translated_description, {table}.translated_description),
                original_amount = EXCLUDED.original_amount,
                original_currency = EXCLUDED.original_currency,
                txn_type = EXCLUDED.txn_type,
                status = EXCLUDED.status,
                identifier = EXCLUDED.identifier,
                installment_number = EXCLUDED.installment_number,
                installment_total = EXCLUDED.installment_total,
                category = EXCLUDED.category,
                company_id = EXCLUDED.company_id,
                user_code = EXCLUDED.user_code,
                channel_id = EXCLUDED.channel_id,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
            table = self.table
        );

        let (id, inserted): (Uuid, bool) = sqlx::query_as(&query)
            .bind(&txn.account_number)
            .bind(txn.date)
            .bind(txn.processed_date)
            .bind(&txn.description)
            .bind(&txn.memo)
            .bind(&txn.translated_description)
            .bind(txn.original_amount)
            .bind(&txn.original_currency)
            .bind(AmountKey::new(txn.charged_amount).value())
            .bind(txn.txn_type.as_str())
            .bind(txn.status.as_str())
            .bind(&txn.identifier)
            .bind(txn.installments.map(|i| i64::from(i.number)))
            .bind(txn.installments.map(|i| i64::from(i.total)))
            .bind(&txn.category)
            .bind(txn.institution.company_id())
            .bind(&txn.user_code)
            .bind(&txn.channel_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(if inserted {
            UpsertOutcome::Inserted(id)
        } else {
            UpsertOutcome::Updated(id)
        })
    }

    /// Retrieves a transaction by UUID.
    pub async fn get(&self, id: Uuid) -> Result<Option<TransactionRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1",
            TRANSACTION_COLUMNS, self.table
        );
        let row: Option<TransactionRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        row.map(TryInto::try_into).transpose()
    }

    /// Retrieves a transaction by its narrow key.
    pub async fn get_by_narrow_key(
        &self,
        key: &NarrowKey,
    ) -> Result<Option<TransactionRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE date = $1 AND charged_amount = $2 AND description = $3",
            TRANSACTION_COLUMNS, self.table
        );
        let row: Option<TransactionRow> = sqlx::query_as(&query)
            .bind(key.date)
            .bind(key.charged_amount.value())
            .bind(&key.description)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        row.map(TryInto::try_into).transpose()
    }

    /// Returns the total number of stored transactions.
    pub async fn count(&self) -> Result<i64, AppError> {
        let query = format!("SELECT COUNT(*) FROM {}", self.table);
        let (count,): (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(count)
    }
}

impl shekel_core::traits::TransactionStore for TransactionRepository {
    async fn find_processed(&self, keys: &[CoarseKey]) -> Result<HashSet<CoarseKey>, AppError> {
        TransactionRepository::find_processed(self, keys).await
    }

    async fn upsert(&self, txn: &Transaction) -> Result<UpsertOutcome, AppError> {
        TransactionRepository::upsert(self, txn).await
    }
}

/// Helper struct for deserializing coarse key lookup results
#[derive(sqlx::FromRow)]
struct CoarseKeyRow {
    date: DateTime<Utc>,
    charged_amount: f64,
    description: String,
    processed_date: DateTime<Utc>,
    status: String,
}

impl CoarseKeyRow {
    fn into_key(self) -> Result<CoarseKey, AppError> {
        Ok(CoarseKey {
            date: self.date,
            charged_amount: AmountKey::new(self.charged_amount),
            description: self.description,
            processed_date: self.processed_date,
            status: self.status.parse::<TransactionStatus>()?,
        })
    }
}

/// Helper struct for deserializing full transaction rows
#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_number: String,
    date: DateTime<Utc>,
    processed_date: DateTime<Utc>,
    description: String,
    memo: Option<String>,
    translated_description: Option<String>,
    original_amount: f64,
    original_currency: String,
    charged_amount: f64,
    txn_type: String,
    status: String,
    identifier: Option<String>,
    installment_number: Option<i64>,
    installment_total: Option<i64>,
    category: Option<String>,
    company_id: String,
    user_code: String,
    channel_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let installments = match (row.installment_number, row.installment_total) {
            (Some(number), Some(total)) => Some(Installments {
                number: u32::try_from(number)
                    .map_err(|e| AppError::Generic(format!("invalid installment number: {}", e)))?,
                total: u32::try_from(total)
                    .map_err(|e| AppError::Generic(format!("invalid installment total: {}", e)))?,
            }),
            _ => None,
        };

        Ok(TransactionRecord {
            id: row.id,
            transaction: Transaction {
                account_number: row.account_number,
                date: row.date,
                processed_date: row.processed_date,
                description: row.description,
                memo: row.memo,
                translated_description: row.translated_description,
                original_amount: row.original_amount,
                original_currency: row.original_currency,
                charged_amount: row.charged_amount,
                txn_type: row.txn_type.parse()?,
                status: row.status.parse()?,
                identifier: row.identifier,
                installments,
                category: row.category,
                institution: row.company_id.parse::<Institution>()?,
                user_code: row.user_code,
                channel_id: row.channel_id,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
