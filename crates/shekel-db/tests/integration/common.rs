//! Test utilities for integration tests.
//!
//! Provides helper functions to set up isolated PostgreSQL containers
//! with the application schema for each test.

use chrono::{DateTime, TimeZone, Utc};
use shekel_core::{Institution, TableNames, Transaction, TransactionStatus, TransactionType};
use shekel_db::ensure_schema;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Sets up a PostgreSQL container and returns a connection pool.
///
/// Each call creates a fresh, isolated database container. The container is
/// automatically cleaned up when the returned `ContainerAsync` is dropped.
/// Tables are created with the given names.
pub async fn setup_test_db(tables: &TableNames) -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "postgres")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    // The server restarts once after init, so early connects can fail
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!(
                        "Failed to connect to database after {} retries: {}",
                        MAX_RETRIES, e
                    );
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    ensure_schema(&pool, tables)
        .await
        .expect("Failed to create schema");

    (pool, container)
}

pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// Creates a completed, untranslated sample transaction.
pub fn sample_transaction(description: &str, amount: f64) -> Transaction {
    Transaction {
        account_number: "1234".to_string(),
        date: utc(2024, 1, 10),
        processed_date: utc(2024, 1, 12),
        description: description.to_string(),
        memo: None,
        translated_description: None,
        original_amount: amount,
        original_currency: "ILS".to_string(),
        charged_amount: amount,
        txn_type: TransactionType::Normal,
        status: TransactionStatus::Completed,
        identifier: Some("77".to_string()),
        installments: None,
        category: None,
        institution: Institution::Max,
        user_code: "dana".to_string(),
        channel_id: Some("-100123".to_string()),
    }
}
