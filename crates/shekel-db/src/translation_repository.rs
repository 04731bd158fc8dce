//! Translation cache repository for PostgreSQL.

use std::collections::HashMap;

use shekel_core::{AppError, TableNames};
use sqlx::{PgPool, Pool, Postgres};

/// Write-once cache of exact description strings to translations.
///
/// Keys are case and whitespace sensitive. Entries are never updated or deleted.
#[derive(Clone)]
pub struct TranslationRepository {
    pool: Pool<Postgres>,
    table: String,
}

impl TranslationRepository {
    pub fn new(pool: PgPool, tables: &TableNames) -> Self {
        Self {
            pool,
            table: tables.translations().to_string(),
        }
    }

    /// Looks up many descriptions in one query.
    pub async fn get_many(
        &self,
        descriptions: &[String],
    ) -> Result<HashMap<String, String>, AppError> {
        if descriptions.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!(
            "SELECT description, translation FROM {} WHERE description = ANY($1)",
            self.table
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&query)
            .bind(descriptions)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().collect())
    }

    /// Stores a translation. Returns false when the description was already cached.
    pub async fn put(&self, description: &str, translation: &str) -> Result<bool, AppError> {
        let query = format!(
            "INSERT INTO {} (description, translation) VALUES ($1, $2) ON CONFLICT (description) DO NOTHING",
            self.table
        );
        let result = sqlx::query(&query)
            .bind(description)
            .bind(translation)
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(result.rows_affected() > 0)
    }
}

impl shekel_core::traits::TranslationCache for TranslationRepository {
    async fn get_many(&self, descriptions: &[String]) -> Result<HashMap<String, String>, AppError> {
        TranslationRepository::get_many(self, descriptions).await
    }

    async fn put(&self, description: &str, translation: &str) -> Result<(), AppError> {
        TranslationRepository::put(self, description, translation).await?;
        Ok(())
    }
}
