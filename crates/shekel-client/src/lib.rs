//! Shekel Client - HTTP clients for external APIs
//!
//! This crate provides HTTP clients for interacting with:
//!
//! - [`scraper`] - The bank scraping sidecar
//! - [`openai`] - OpenAI chat completions, used for batch translation
//! - [`telegram`] - Telegram Bot API, used for notifications
//!
//! # Overview
//!
//! The clients handle authentication, request building, response parsing,
//! and error handling for their respective APIs. Each one implements the
//! matching trait from `shekel_core::traits`.

pub mod openai;
pub mod scraper;
pub mod telegram;

// Re-export main client types
pub use openai::OpenAIClient;
pub use scraper::ScraperClient;
pub use telegram::TelegramClient;
