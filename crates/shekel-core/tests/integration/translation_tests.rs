//! Integration tests for TranslationService.

use chrono::TimeZone;
use chrono::Utc;
use shekel_core::{
    Institution, PromptTemplate, RetryPolicy, Transaction, TransactionStatus, TransactionType,
    TranslationService,
};

use crate::integration::common::{MockTranslationCache, MockTranslator, TEMPLATE};

fn txn(description: &str, memo: Option<&str>) -> Transaction {
    Transaction {
        account_number: "1234".to_string(),
        date: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
        processed_date: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
        description: description.to_string(),
        memo: memo.map(str::to_string),
        translated_description: None,
        original_amount: -10.0,
        original_currency: "ILS".to_string(),
        charged_amount: -10.0,
        txn_type: TransactionType::Normal,
        status: TransactionStatus::Completed,
        identifier: None,
        installments: None,
        category: None,
        institution: Institution::Max,
        user_code: "dana".to_string(),
        channel_id: None,
    }
}

fn service(
    cache: &MockTranslationCache,
    translator: &MockTranslator,
) -> TranslationService<MockTranslationCache, MockTranslator> {
    TranslationService::new(
        cache.clone(),
        translator.clone(),
        PromptTemplate::new(TEMPLATE).unwrap(),
    )
    .with_retry_policy(RetryPolicy::immediate(5))
}

#[tokio::test]
async fn test_duplicate_descriptions_translated_once() {
    let cache = MockTranslationCache::new();
    let translator = MockTranslator::new();
    let service = service(&cache, &translator);

    let txns = vec![txn("קפה", None), txn("סופר", None), txn("קפה", None)];
    let result = service.translate(&txns).await;

    assert_eq!(
        result,
        vec![
            Some("EN:קפה".to_string()),
            Some("EN:סופר".to_string()),
            Some("EN:קפה".to_string()),
        ]
    );
    assert_eq!(translator.calls(), 1);
    assert_eq!(translator.batches()[0], vec!["קפה", "סופר"]);
    assert_eq!(cache.get("קפה").as_deref(), Some("EN:קפה"));
}

#[tokio::test]
async fn test_cache_hits_skip_translator() {
    let cache = MockTranslationCache::new();
    cache.insert("קפה", "Coffee");
    let translator = MockTranslator::new();
    let service = service(&cache, &translator);

    let result = service.translate(&[txn("קפה", None)]).await;
    assert_eq!(result, vec![Some("Coffee".to_string())]);
    assert_eq!(translator.calls(), 0);
    assert_eq!(cache.get_calls(), 1);
}

#[tokio::test]
async fn test_only_misses_are_sent() {
    let cache = MockTranslationCache::new();
    cache.insert("קפה", "Coffee");
    let translator = MockTranslator::new();
    let service = service(&cache, &translator);

    let result = service
        .translate(&[txn("קפה", None), txn("מאפייה", None)])
        .await;
    assert_eq!(
        result,
        vec![Some("Coffee".to_string()), Some("EN:מאפייה".to_string())]
    );
    assert_eq!(translator.batches(), vec![vec!["מאפייה".to_string()]]);
}

#[tokio::test]
async fn test_memo_is_part_of_the_source() {
    let cache = MockTranslationCache::new();
    let translator = MockTranslator::new();
    let service = service(&cache, &translator);

    let result = service
        .translate(&[txn("העברה", Some("שכר דירה")), txn("העברה", Some(""))])
        .await;
    assert_eq!(
        result,
        vec![
            Some("EN:העברה - שכר דירה".to_string()),
            Some("EN:העברה".to_string()),
        ]
    );
    assert!(cache.get("העברה - שכר דירה").is_some());
}

#[tokio::test]
async fn test_shape_mismatch_is_retried() {
    let cache = MockTranslationCache::new();
    let translator = MockTranslator::malformed_for(2);
    let service = service(&cache, &translator);

    let result = service.translate(&[txn("קפה", None)]).await;
    assert_eq!(result, vec![Some("EN:קפה".to_string())]);
    assert_eq!(translator.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shape_mismatch_backs_off_under_default_policy() {
    let cache = MockTranslationCache::new();
    let translator = MockTranslator::malformed_for(1);
    let service = TranslationService::new(
        cache.clone(),
        translator.clone(),
        PromptTemplate::new(TEMPLATE).unwrap(),
    );

    let started = tokio::time::Instant::now();
    let result = service.translate(&[txn("קפה", None)]).await;

    assert_eq!(result, vec![Some("EN:קפה".to_string())]);
    assert_eq!(translator.calls(), 2);
    assert!(started.elapsed() >= std::time::Duration::from_secs(20));
}

#[tokio::test]
async fn test_exhaustion_degrades_to_none() {
    let cache = MockTranslationCache::new();
    let translator = MockTranslator::malformed_for(100);
    let service = service(&cache, &translator);

    let result = service.translate(&[txn("קפה", None), txn("סופר", None)]).await;
    assert_eq!(result, vec![None, None]);
    assert_eq!(translator.calls(), 5);
    assert_eq!(cache.len(), 0);
}

#[tokio::test]
async fn test_cache_read_failure_treated_as_misses() {
    let cache = MockTranslationCache::new();
    cache.insert("קפה", "Coffee");
    cache.fail_reads();
    let translator = MockTranslator::new();
    let service = service(&cache, &translator);

    let result = service.translate(&[txn("קפה", None)]).await;
    assert_eq!(result, vec![Some("EN:קפה".to_string())]);
    assert_eq!(translator.calls(), 1);
}

#[tokio::test]
async fn test_disabled_service_touches_nothing() {
    let cache = MockTranslationCache::new();
    let service: TranslationService<MockTranslationCache, MockTranslator> =
        TranslationService::disabled(cache.clone());

    assert!(!service.is_enabled());
    let result = service.translate(&[txn("קפה", None), txn("סופר", None)]).await;
    assert_eq!(result, vec![None, None]);
    assert_eq!(cache.get_calls(), 0);
}

#[tokio::test]
async fn test_multiline_memo_keeps_batch_aligned() {
    let cache = MockTranslationCache::new();
    let translator = MockTranslator::new();
    let service = service(&cache, &translator);

    let txns = vec![txn("קפה", None), txn("העברה", Some("line1\nline2"))];
    let result = service.translate(&txns).await;

    assert_eq!(
        result,
        vec![
            Some("EN:קפה".to_string()),
            Some("EN:העברה - line1 line2".to_string()),
        ]
    );
    assert_eq!(translator.calls(), 1);
}
