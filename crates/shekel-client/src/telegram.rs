//! Telegram Bot API client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use shekel_core::HttpConfig;
use shekel_core::error::AppError;

const API_BASE: &str = "https://api.telegram.org";

/// Sends Markdown messages through a Telegram bot.
///
/// # Examples
///
/// ```no_run
/// use shekel_client::TelegramClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bot = TelegramClient::new("123456:ABC-DEF")?;
/// bot.send_message("-100123", "Account: *1234 💸*").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    send_url: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Every Bot API response carries `ok`, plus `description` on failure.
#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self, AppError> {
        Self::with_base_url(bot_token, API_BASE)
    }

    /// Creates a client against a custom Bot API server.
    pub fn with_base_url(bot_token: &str, base_url: &str) -> Result<Self, AppError> {
        if bot_token.trim().is_empty() {
            return Err(AppError::ConfigError(
                "TELEGRAM_BOT_TOKEN is empty".to_string(),
            ));
        }

        let http_config = HttpConfig::default();
        let client = Client::builder()
            .timeout(http_config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                base_url.trim_end_matches('/'),
                bot_token
            ),
            timeout_secs: http_config.timeout.as_secs(),
        })
    }

    /// Posts `text` to `chat_id` with Markdown parse mode.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), AppError> {
        let request_body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(&self.send_url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                // The URL embeds the bot token; keep it out of error messages
                let e = e.without_url();
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Cannot connect to Telegram: {}", e))
                } else {
                    AppError::ClientError(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        check_response(status.as_u16(), &body)
    }
}

fn check_response(status_code: u16, body: &str) -> Result<(), AppError> {
    let parsed = serde_json::from_str::<BotResponse>(body).ok();

    if (200..300).contains(&status_code) && parsed.as_ref().is_none_or(|r| r.ok) {
        return Ok(());
    }

    if status_code == 429 {
        if let Some(retry_after) = parsed
            .as_ref()
            .and_then(|r| r.parameters.as_ref())
            .and_then(|p| p.retry_after)
        {
            tracing::debug!(retry_after, "Telegram asked to slow down");
        }
        return Err(AppError::RateLimitExceeded);
    }

    let message = parsed
        .and_then(|r| r.description)
        .unwrap_or_else(|| format!("HTTP {}: {}", status_code, body));

    Err(AppError::ClientError(format!("Telegram error: {}", message)))
}

impl shekel_core::traits::Notifier for TelegramClient {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), AppError> {
        self.send_message(channel_id, text).await
    }
}
