use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur while reconciling
/// transactions. It uses the `thiserror` crate for ergonomic error handling and
/// automatic conversion from underlying library errors.
///
/// # Error Conversion
///
/// Most errors automatically convert from their source types using the `#[from]` attribute:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use shekel_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// This error wraps all errors from SQLx database operations, including
    /// connection failures, query errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed.
    ///
    /// This error occurs when HTTP requests fail due to network issues,
    /// unexpected status codes, or undecodable bodies.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// The translation service answered with the wrong number of lines.
    ///
    /// `expected` counts the leading seed line, so it is always one more
    /// than the number of descriptions that were sent.
    #[error("Translation response has {actual} lines, expected {expected}")]
    TranslationShapeMismatch { expected: usize, actual: usize },

    /// The scraping session reported a failure.
    ///
    /// Terminal for the task run: nothing is persisted and the scrape is not retried.
    #[error("Scraping failed: {error_type} - {message}")]
    ScrapeFailed { error_type: String, message: String },

    /// An institution name in the task configuration is not supported.
    #[error("Unknown institution: {0}")]
    UnknownInstitution(String),

    /// Configuration error.
    ///
    /// This error occurs when reading or parsing configuration fails, such as
    /// a malformed tasks file, an invalid timezone or an invalid table name.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants
    /// for better error handling and debugging.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The service may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::ScrapeFailed {
                error_type,
                message,
            } => {
                format!(
                    "The institution session failed ({}): {}\n   Check the credentials for this task.",
                    error_type, message
                )
            }
            AppError::UnknownInstitution(name) => {
                format!(
                    "Unknown institution: {}\n   Example: hapoalim, leumi, visaCal, max",
                    name
                )
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your environment or tasks file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is worth retrying.
    ///
    /// # Examples
    ///
    /// ```
    /// use shekel_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// // A malformed batch answer is retried: the model may answer correctly next time
    /// let err = AppError::TranslationShapeMismatch { expected: 3, actual: 2 };
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::ConfigError("bad".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::RateLimitExceeded
            | AppError::ClientError(_)
            | AppError::SerializationError(_)
            | AppError::TranslationShapeMismatch { .. }
            | AppError::Generic(_) => true,
            AppError::DatabaseError(_)
            | AppError::ScrapeFailed { .. }
            | AppError::UnknownInstitution(_)
            | AppError::ConfigError(_) => false,
        }
    }
}
