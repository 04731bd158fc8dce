//! Schema bootstrap.
//!
//! Table names come from configuration and are validated by
//! [`TableNames`] before they reach `format!`.

use shekel_core::{AppError, TableNames};
use sqlx::PgPool;

fn schema_statements(tables: &TableNames) -> Vec<String> {
    let txns = tables.transactions();
    let translations = tables.translations();

    vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS {txns} (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                account_number TEXT NOT NULL,
                date TIMESTAMPTZ NOT NULL,
                processed_date TIMESTAMPTZ NOT NULL,
                description TEXT NOT NULL,
                memo TEXT,
                translated_description TEXT,
                original_amount DOUBLE PRECISION NOT NULL,
                original_currency TEXT NOT NULL,
                charged_amount DOUBLE PRECISION NOT NULL,
                txn_type TEXT NOT NULL,
                status TEXT NOT NULL,
                identifier TEXT,
                installment_number BIGINT,
                installment_total BIGINT,
                category TEXT,
                company_id TEXT NOT NULL,
                user_code TEXT NOT NULL,
                channel_id TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ
            )"#
        ),
        // Narrow key: the upsert's ON CONFLICT target
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {txns}_narrow_key_idx ON {txns} (date, charged_amount, description)"
        ),
        format!("CREATE INDEX IF NOT EXISTS {txns}_user_date_idx ON {txns} (user_code, date)"),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {translations} (
                description TEXT PRIMARY KEY,
                translation TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
    ]
}

/// Creates the tables and indexes if they do not exist yet.
///
/// Each statement runs separately; running this on every startup is safe.
pub async fn ensure_schema(pool: &PgPool, tables: &TableNames) -> Result<(), AppError> {
    for statement in schema_statements(tables) {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(AppError::DatabaseError)?;
    }

    tracing::debug!(
        transactions = tables.transactions(),
        translations = tables.translations(),
        "Schema ready"
    );

    Ok(())
}
