//! Integration tests for TransactionRepository and TranslationRepository.
//!
//! These tests verify the repositories against a real PostgreSQL database.
//! Each test runs in an isolated container.

use shekel_core::{
    Installments, TableNames, TransactionStatus, TransactionStore, TransactionType,
    TranslationCache,
};
use shekel_db::{TransactionRepository, TranslationRepository};

use crate::integration::common::{sample_transaction, setup_test_db, utc};

#[tokio::test]
async fn test_upsert_inserts_then_updates() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool, &tables);

    let txn = sample_transaction("Coffee Shop", -18.5);
    let first = repo.upsert(&txn).await.expect("first upsert should succeed");
    assert!(first.is_inserted());

    let mut changed = txn.clone();
    changed.status = TransactionStatus::Pending;
    changed.processed_date = utc(2024, 1, 15);
    let second = repo
        .upsert(&changed)
        .await
        .expect("second upsert should succeed");

    assert!(!second.is_inserted());
    assert_eq!(first.id(), second.id(), "narrow key should map to one record");
    assert_eq!(repo.count().await.unwrap(), 1);

    let stored = repo.get(first.id()).await.unwrap().expect("record should exist");
    assert_eq!(stored.transaction.status, TransactionStatus::Pending);
    assert_eq!(stored.transaction.processed_date, utc(2024, 1, 15));
    assert!(stored.updated_at.is_some());
    assert!(stored.updated_at.unwrap() >= stored.created_at);
}

#[tokio::test]
async fn test_upsert_never_clears_translation() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool, &tables);

    let mut txn = sample_transaction("מאפייה", -32.0);
    txn.translated_description = Some("Bakery".to_string());
    let outcome = repo.upsert(&txn).await.unwrap();

    txn.translated_description = None;
    txn.memo = Some("note".to_string());
    repo.upsert(&txn).await.unwrap();

    let stored = repo.get(outcome.id()).await.unwrap().unwrap();
    assert_eq!(
        stored.transaction.translated_description.as_deref(),
        Some("Bakery")
    );
    assert_eq!(stored.transaction.memo.as_deref(), Some("note"));
}

#[tokio::test]
async fn test_round_trips_installments_and_institution() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool, &tables);

    let mut txn = sample_transaction("Electronics", -250.0);
    txn.txn_type = TransactionType::Installments;
    txn.installments = Some(Installments {
        number: 3,
        total: 12,
    });
    let outcome = repo.upsert(&txn).await.unwrap();

    let stored = repo
        .get_by_narrow_key(&txn.narrow_key())
        .await
        .unwrap()
        .expect("lookup by narrow key should find the record");
    assert_eq!(stored.id, outcome.id());
    assert_eq!(stored.transaction, txn);
}

#[tokio::test]
async fn test_find_processed_requires_translation() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool, &tables);

    let untranslated = sample_transaction("Supermarket", -99.9);
    let mut translated = sample_transaction("Pharmacy", -45.0);
    translated.translated_description = Some("Pharmacy".to_string());
    repo.upsert(&untranslated).await.unwrap();
    repo.upsert(&translated).await.unwrap();

    let keys = vec![untranslated.coarse_key(), translated.coarse_key()];
    let processed = repo.find_processed(&keys).await.unwrap();

    assert_eq!(processed.len(), 1);
    assert!(processed.contains(&translated.coarse_key()));
}

#[tokio::test]
async fn test_find_processed_matches_all_coarse_fields() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool, &tables);

    let mut txn = sample_transaction("Fuel", -210.0);
    txn.translated_description = Some("Fuel".to_string());
    repo.upsert(&txn).await.unwrap();

    let mut status_changed = txn.clone();
    status_changed.status = TransactionStatus::Pending;
    let mut reprocessed = txn.clone();
    reprocessed.processed_date = utc(2024, 2, 1);

    let processed = repo
        .find_processed(&[status_changed.coarse_key(), reprocessed.coarse_key()])
        .await
        .unwrap();
    assert!(processed.is_empty());

    assert!(repo.find_processed(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_negative_zero_matches_zero() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool, &tables);

    let mut txn = sample_transaction("Fee reversal", 0.0);
    txn.translated_description = Some("Fee reversal".to_string());
    let first = repo.upsert(&txn).await.unwrap();

    let mut negative = txn.clone();
    negative.charged_amount = -0.0;
    let processed = repo.find_processed(&[negative.coarse_key()]).await.unwrap();
    assert_eq!(processed.len(), 1);

    let second = repo.upsert(&negative).await.unwrap();
    assert_eq!(first.id(), second.id());
}

#[tokio::test]
async fn test_translation_cache_is_write_once() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let cache = TranslationRepository::new(pool, &tables);

    assert!(cache.put("קפה", "Coffee").await.unwrap());
    assert!(!cache.put("קפה", "Cafe").await.unwrap());

    let hits = cache.get_many(&["קפה".to_string()]).await.unwrap();
    assert_eq!(hits.get("קפה").map(String::as_str), Some("Coffee"));
}

#[tokio::test]
async fn test_translation_cache_returns_only_hits() {
    let tables = TableNames::default();
    let (pool, _container) = setup_test_db(&tables).await;
    let cache = TranslationRepository::new(pool, &tables);

    TranslationCache::put(&cache, "סופר", "Supermarket").await.unwrap();

    let hits = TranslationCache::get_many(
        &cache,
        &["סופר".to_string(), "סופר ".to_string(), "מאפייה".to_string()],
    )
    .await
    .unwrap();

    assert_eq!(hits.len(), 1, "keys are exact, whitespace included");
    assert_eq!(hits["סופר"], "Supermarket");
}

#[tokio::test]
async fn test_configurable_table_names() {
    let tables = TableNames::new("bank_txns", "desc_cache").unwrap();
    let (pool, _container) = setup_test_db(&tables).await;
    let repo = TransactionRepository::new(pool.clone(), &tables);
    let cache = TranslationRepository::new(pool.clone(), &tables);

    let outcome = TransactionStore::upsert(&repo, &sample_transaction("Books", -60.0))
        .await
        .unwrap();
    assert!(outcome.is_inserted());
    cache.put("Books", "Books").await.unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bank_txns")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let (cached,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM desc_cache")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(cached, 1);
}
