//! Shekel DB - PostgreSQL persistence for Shekel Streamer
//!
//! This crate implements the storage traits of `shekel-core` on top of a
//! shared `sqlx` connection pool.
//!
//! # Overview
//!
//! The main components are:
//! - [`TransactionRepository`] - Transaction records, upserted by narrow key
//! - [`TranslationRepository`] - Write-once description to translation cache
//! - [`ensure_schema`] - Idempotent table and index bootstrap

mod schema;
mod transaction_repository;
mod translation_repository;

pub use schema::ensure_schema;
pub use transaction_repository::{TransactionRecord, TransactionRepository};
pub use translation_repository::TranslationRepository;
