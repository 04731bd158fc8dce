//! Integration tests for SyncService.

use chrono::{Duration, Utc};
use shekel_core::{AppError, Institution, SyncConfig, TaskRegistry, TransactionStatus};

use crate::integration::common::{Harness, MockNotifier, MockTranslator, account, raw, task, utc};

/// Run 1 inserts and notifies, run 2 skips everything, run 3 updates in place.
#[tokio::test]
async fn test_coffee_shop_three_runs() {
    let h = Harness::new();
    let task = task(Institution::VisaCal);

    let coffee = raw("Coffee Shop", -120.50, utc(2024, 1, 10));
    h.scraper
        .set_accounts(Institution::VisaCal, account(vec![coffee.clone()]));

    // Run 1: new record
    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.translator.calls(), 1);
    let stored = &h.store.rows()[0];
    assert_eq!(
        stored.txn.translated_description.as_deref(),
        Some("EN:Coffee Shop")
    );

    // Run 2: same data, excluded by the coarse filter
    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.unchanged, 1);
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.translator.calls(), 1);

    // Run 3: processed date shifts, same narrow key
    let mut shifted = coffee;
    shifted.processed_date = utc(2024, 1, 11);
    h.scraper
        .set_accounts(Institution::VisaCal, account(vec![shifted]));

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.updated, 1);
    assert_eq!(h.notifier.sent().len(), 1, "updates never notify");
    assert_eq!(h.translator.calls(), 1, "translation comes from the cache");

    assert_eq!(h.store.len(), 1);
    let stored = &h.store.rows()[0];
    assert_eq!(stored.txn.processed_date, utc(2024, 1, 11));
    assert!(stored.updated_at.is_some());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let h = Harness::new();
    let task = task(Institution::Max);
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![
            raw("Supermarket", -250.0, utc(2024, 1, 8)),
            raw("Salary", 12000.0, utc(2024, 1, 9)),
            raw("Bakery", -32.9, utc(2024, 1, 10)),
        ]),
    );

    let first = h.service.run_task(&task).await.unwrap();
    assert_eq!(first.created, 3);
    let rows_after_first = {
        let mut rows = h.store.rows();
        rows.sort_by_key(|r| r.txn.date);
        rows
    };

    let second = h.service.run_task(&task).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 3);
    assert_eq!(h.notifier.sent().len(), 3);

    let mut rows_after_second = h.store.rows();
    rows_after_second.sort_by_key(|r| r.txn.date);
    for (before, after) in rows_after_first.iter().zip(&rows_after_second) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.txn, after.txn);
        assert!(after.updated_at.is_none());
    }
}

#[tokio::test]
async fn test_status_change_collapses_into_one_record() {
    let h = Harness::new();
    let task = task(Institution::Isracard);

    let mut pending = raw("Electric Company", -410.0, utc(2024, 1, 5));
    pending.status = TransactionStatus::Pending;
    h.scraper
        .set_accounts(Institution::Isracard, account(vec![pending.clone()]));
    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 1);

    let mut completed = pending;
    completed.status = TransactionStatus::Completed;
    completed.processed_date = utc(2024, 1, 7);
    h.scraper
        .set_accounts(Institution::Isracard, account(vec![completed]));
    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.updated, 1);

    assert_eq!(h.store.len(), 1);
    assert_eq!(h.store.rows()[0].txn.status, TransactionStatus::Completed);
    assert_eq!(h.notifier.sent().len(), 1);
}

/// A stored record without a translation is reprocessed even when its coarse key matches.
#[tokio::test]
async fn test_untranslated_record_is_reprocessed() {
    // Every attempt in run 1 returns a malformed batch
    let h = Harness::with(
        MockTranslator::malformed_for(5),
        MockNotifier::new(),
        SyncConfig::default(),
    );
    let task = task(Institution::Leumi);
    h.scraper.set_accounts(
        Institution::Leumi,
        account(vec![raw("Pharmacy", -75.0, utc(2024, 1, 3))]),
    );

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(h.translator.calls(), 5);
    assert!(h.store.rows()[0].txn.translated_description.is_none());
    assert_eq!(h.cache.len(), 0);
    assert_eq!(h.notifier.sent().len(), 1);

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.unchanged, 0);
    assert_eq!(stats.updated, 1);
    assert_eq!(
        h.store.rows()[0].txn.translated_description.as_deref(),
        Some("EN:Pharmacy")
    );
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_chunking_65_into_30_30_5() {
    let h = Harness::new();
    let task = task(Institution::Hapoalim);
    let start = utc(2024, 1, 1);
    let txns = (0..65)
        .map(|i| raw(&format!("Merchant {:02}", i), -10.0 - i as f64, start + Duration::hours(i)))
        .collect();
    h.scraper.set_accounts(Institution::Hapoalim, account(txns));

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 65);

    let sizes: Vec<usize> = h.translator.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![30, 30, 5]);
    assert_eq!(h.translator.batches()[2][0], "Merchant 60");
}

#[tokio::test]
async fn test_custom_chunk_size() {
    let h = Harness::with(
        MockTranslator::new(),
        MockNotifier::new(),
        SyncConfig::default().with_chunk_size(2),
    );
    let task = task(Institution::Max);
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![
            raw("A", -1.0, utc(2024, 1, 1)),
            raw("B", -2.0, utc(2024, 1, 2)),
            raw("C", -3.0, utc(2024, 1, 3)),
        ]),
    );

    h.service.run_task(&task).await.unwrap();
    assert_eq!(h.translator.calls(), 2);
}

#[tokio::test]
async fn test_notifications_follow_event_date_order() {
    let h = Harness::new();
    let task = task(Institution::Max);
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![
            raw("Third", -3.0, utc(2024, 1, 12)),
            raw("First", -1.0, utc(2024, 1, 10)),
            raw("Second", -2.0, utc(2024, 1, 11)),
        ]),
    );

    h.service.run_task(&task).await.unwrap();

    let descriptions: Vec<String> = h
        .notifier
        .sent()
        .iter()
        .map(|(_, text)| {
            text.lines()
                .find_map(|l| l.strip_prefix("Description: *"))
                .unwrap()
                .trim_end_matches('*')
                .to_string()
        })
        .collect();
    assert_eq!(descriptions, vec!["First", "Second", "Third"]);
    assert!(h.notifier.sent().iter().all(|(channel, _)| channel == "-100123"));
}

#[tokio::test]
async fn test_scrape_failure_persists_nothing() {
    let h = Harness::new();
    let task = task(Institution::Discount);
    h.scraper
        .set_failure(Institution::Discount, "INVALID_PASSWORD", "Wrong password");

    let err = h.service.run_task(&task).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::ScrapeFailed { ref error_type, .. } if error_type == "INVALID_PASSWORD"
    ));
    assert_eq!(h.store.len(), 0);
    assert_eq!(h.store.find_calls(), 0);
    assert_eq!(h.scraper.calls().len(), 1, "scrape is never retried");
}

#[tokio::test]
async fn test_empty_scrape_short_circuits() {
    let h = Harness::new();
    let task = task(Institution::Max);
    h.scraper.set_accounts(Institution::Max, account(vec![]));

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.total(), 0);
    assert_eq!(h.store.find_calls(), 0);
    assert_eq!(h.translator.calls(), 0);
}

#[tokio::test]
async fn test_scrape_window_uses_lookback_days() {
    let h = Harness::with(
        MockTranslator::new(),
        MockNotifier::new(),
        SyncConfig::default().with_lookback_days(3),
    );
    let task = task(Institution::Max);
    h.scraper.set_accounts(Institution::Max, account(vec![]));

    let before = Utc::now();
    h.service.run_task(&task).await.unwrap();
    let after = Utc::now();

    let (_, start_date) = h.scraper.calls()[0];
    assert!(start_date >= before - Duration::days(3));
    assert!(start_date <= after - Duration::days(3));
}

#[tokio::test]
async fn test_store_failure_aborts_rest_of_task() {
    let h = Harness::new();
    let task = task(Institution::Max);
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![
            raw("Persisted", -1.0, utc(2024, 1, 1)),
            raw("Broken", -2.0, utc(2024, 1, 2)),
            raw("Never reached", -3.0, utc(2024, 1, 3)),
        ]),
    );
    h.store.fail_upsert_for("Broken");

    let err = h.service.run_task(&task).await.unwrap_err();
    assert!(matches!(err, AppError::DatabaseError(_)));
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_delivery_failure_keeps_record() {
    let h = Harness::with(
        MockTranslator::new(),
        MockNotifier::failing(),
        SyncConfig::default(),
    );
    let task = task(Institution::Max);
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![raw("Cinema", -60.0, utc(2024, 1, 4))]),
    );

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.notifications_failed, 1);
    assert_eq!(h.notifier.attempts(), 5);
    assert_eq!(h.store.len(), 1);

    // The record is not re-notified on the next run
    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.unchanged, 1);
    assert_eq!(h.notifier.attempts(), 5);
}

#[tokio::test]
async fn test_task_without_channel_skips_notification() {
    let h = Harness::new();
    let mut task = task(Institution::Max);
    task.channel_id = None;
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![raw("Kiosk", -8.0, utc(2024, 1, 4))]),
    );

    let stats = h.service.run_task(&task).await.unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.notifications_failed, 0);
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test]
async fn test_run_all_isolates_failing_tasks() {
    let h = Harness::new();
    h.scraper
        .set_failure(Institution::Leumi, "GENERAL_ERROR", "Session expired");
    h.scraper.set_accounts(
        Institution::Max,
        account(vec![raw("Gas Station", -300.0, utc(2024, 1, 6))]),
    );
    // No result configured for Isracard: the scraper is unreachable

    let registry = TaskRegistry::new(vec![
        task(Institution::Leumi),
        task(Institution::Isracard),
        task(Institution::Max),
    ]);

    let summary = h.service.run_all(&registry).await;
    assert_eq!(summary.total_tasks(), 3);
    assert_eq!(summary.failed_count(), 2);
    assert_eq!(summary.successful_count(), 1);
    assert_eq!(summary.total_created(), 1);

    let leumi = &summary.results[0];
    assert_eq!(leumi.task_key, "dana/leumi");
    assert!(leumi.error.as_deref().unwrap().contains("GENERAL_ERROR"));
    assert_eq!(summary.results[2].task_key, "dana/max");
    assert!(summary.results[2].is_success());
}
