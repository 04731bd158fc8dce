//! Client for the bank scraping sidecar.
//!
//! The sidecar wraps a headless-browser scraping library behind one HTTP
//! endpoint. Each request drives a full login and history download, which can
//! take minutes, so the HTTP client has no request timeout.
//!
//! ```text
//! POST {SCRAPER_URL}/scrape
//! {"companyId": "visaCal", "credentials": {...}, "startDate": "...", "combineInstallments": false}
//!
//! {"success": true, "accounts": [{"accountNumber": "1234", "txns": [...]}]}
//! {"success": false, "errorType": "INVALID_PASSWORD", "errorMessage": "..."}
//! ```

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use shekel_core::error::AppError;
use shekel_core::{Credentials, Institution, ScrapeResult, ScrapedAccount};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    company_id: &'a str,
    credentials: &'a Credentials,
    start_date: DateTime<Utc>,
    combine_installments: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ScrapeResponse {
    success: bool,
    #[serde(default)]
    accounts: Vec<ScrapedAccount>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<ScrapeResponse> for ScrapeResult {
    fn from(response: ScrapeResponse) -> Self {
        if response.success {
            ScrapeResult::Success {
                accounts: response.accounts,
            }
        } else {
            ScrapeResult::Failure {
                error_type: response
                    .error_type
                    .unwrap_or_else(|| "GENERIC".to_string()),
                error_message: response.error_message.unwrap_or_default(),
            }
        }
    }
}

/// HTTP client for the scraping sidecar.
#[derive(Clone)]
pub struct ScraperClient {
    client: Client,
    scrape_url: Url,
}

impl ScraperClient {
    /// Creates a client for the sidecar at `base_url` (e.g. `http://scraper:3000`).
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid SCRAPER_URL '{}': {}", base_url, e)))?;
        let scrape_url = base
            .join("scrape")
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        let client = Client::builder()
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self { client, scrape_url })
    }

    /// Runs one scraping session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NetworkError` if the sidecar is unreachable and
    /// `AppError::ClientError` for non-2xx replies or undecodable bodies.
    /// Institution-side failures are not errors; they come back as
    /// [`ScrapeResult::Failure`].
    pub async fn scrape(
        &self,
        institution: Institution,
        credentials: &Credentials,
        start_date: DateTime<Utc>,
    ) -> Result<ScrapeResult, AppError> {
        let request_body = ScrapeRequest {
            company_id: institution.company_id(),
            credentials,
            start_date,
            combine_installments: false,
        };

        tracing::debug!(institution = %institution, start_date = %start_date, "Requesting scrape");

        let response = self
            .client
            .post(self.scrape_url.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AppError::NetworkError(format!("Cannot connect to scraper: {}", e))
                } else {
                    AppError::ClientError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::ClientError(format!(
                "Scraper returned HTTP {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: ScrapeResponse = response.json().await.map_err(|e| {
            AppError::ClientError(format!("Failed to parse scraper response: {}", e))
        })?;

        Ok(body.into())
    }
}

impl shekel_core::traits::Scraper for ScraperClient {
    async fn scrape(
        &self,
        institution: Institution,
        credentials: &Credentials,
        start_date: DateTime<Utc>,
    ) -> Result<ScrapeResult, AppError> {
        ScraperClient::scrape(self, institution, credentials, start_date).await
    }
}
