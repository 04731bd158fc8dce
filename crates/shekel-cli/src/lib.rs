//! Shekel Streamer - scheduled bank transaction sync
//!
//! The binary wires the `shekel-core` pipeline to PostgreSQL, the scraping
//! sidecar, OpenAI and Telegram. This library half holds the pieces worth
//! testing on their own: CLI configuration and the scheduled runner.

pub mod config;
pub mod schedule;

pub use config::{Config, LogFormat, version_info};
pub use schedule::{SyncRunner, normalize_cron};
