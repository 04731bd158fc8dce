//! OpenAI chat completions client.
//!
//! Used as the [`Translator`](shekel_core::traits::Translator) behind batch
//! description translation. Any chat model works; the model name comes from
//! `GPT_MODEL_FAST`.
//!
//! # Examples
//!
//! ```no_run
//! use shekel_client::OpenAIClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAIClient::new("sk-your-api-key", "gpt-4o-mini")?;
//! let text = client.complete("Translate to English: קפה").await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

use reqwest::Client;
use serde::{Deserialize, Serialize};
use shekel_core::HttpConfig;
use shekel_core::error::AppError;

/// Sampling temperature for translation requests. Low for stable output.
pub const TRANSLATION_TEMPERATURE: f32 = 0.2;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// HTTP client for OpenAI's Chat Completions API.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout_secs: u64,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error response from OpenAI API
#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

impl OpenAIClient {
    /// Creates a new OpenAI client for the given chat model.
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_config(api_key, model, None)
    }

    /// Creates a new OpenAI client with full configuration.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Chat model name
    /// * `endpoint` - Custom chat completions URL (for Azure OpenAI or proxies)
    pub fn with_config(
        api_key: &str,
        model: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, AppError> {
        if model.trim().is_empty() {
            return Err(AppError::ConfigError(
                "GPT_MODEL_FAST must name a chat model".to_string(),
            ));
        }

        let http_config = HttpConfig::default();
        let client = Client::builder()
            .timeout(http_config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            timeout_secs: http_config.timeout.as_secs(),
        })
    }

    /// Returns the model being used.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `prompt` as a single user message and returns the reply text.
    pub async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TRANSLATION_TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Cannot connect to OpenAI: {}", e))
                } else {
                    AppError::ClientError(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();

            let message = if let Ok(openai_error) = serde_json::from_str::<OpenAIError>(&error_text)
            {
                openai_error.error.message
            } else {
                format!("HTTP {}: {}", status_code, error_text)
            };

            return match status_code {
                401 => Err(AppError::ClientError(format!(
                    "OpenAI authentication failed: {}. Check your OPENAI_API_KEY.",
                    message
                ))),
                429 => Err(AppError::RateLimitExceeded),
                _ => Err(AppError::ClientError(format!("OpenAI error: {}", message))),
            };
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AppError::ClientError(format!("Failed to parse OpenAI response: {}", e))
        })?;

        first_choice_text(chat_response)
    }
}

fn first_choice_text(response: ChatResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::ClientError("OpenAI returned no completion".to_string()))
}

impl shekel_core::traits::Translator for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        OpenAIClient::complete(self, prompt).await
    }
}
