//! Content-addressed translation cache and batch translator.
//!
//! Descriptions are translated in batches: all cache misses of a chunk are
//! joined with newlines and sent in a single completion request. The model
//! is asked to answer one line per input, preceded by one seed line that is
//! discarded. A response with any other line count fails the attempt and is
//! retried under [`RetryPolicy::translation`].
//!
//! Translation is best effort. When it is disabled, or every attempt fails,
//! the affected transactions simply keep `translated_description = None` and
//! are picked up again on the next run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, warn};

use crate::error::AppError;
use crate::models::Transaction;
use crate::retry::RetryPolicy;
use crate::traits::{TranslationCache, Translator};

/// Marker replaced by the newline-joined descriptions.
pub const PLACEHOLDER: &str = "<text_to_replace>";

/// A prompt with exactly one insertion point for the descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    /// Parses a template, expanding literal `\n` escape sequences into newlines.
    ///
    /// Fails when the template has no [`PLACEHOLDER`].
    pub fn new(raw: &str) -> Result<Self, AppError> {
        if !raw.contains(PLACEHOLDER) {
            return Err(AppError::ConfigError(format!(
                "Translation prompt must contain {}",
                PLACEHOLDER
            )));
        }
        Ok(Self(raw.replace("\\n", "\n")))
    }

    /// Substitutes the descriptions, one per line, for the first placeholder.
    pub fn render(&self, descriptions: &[String]) -> String {
        self.0.replacen(PLACEHOLDER, &descriptions.join("\n"), 1)
    }
}

/// Validates a batch response and returns one translation per description.
///
/// The response must have exactly `count + 1` lines; the first one is the seed
/// line and is dropped. Lines are trimmed.
pub fn parse_batch_response(text: &str, count: usize) -> Result<Vec<String>, AppError> {
    let lines: Vec<String> = text.split('\n').map(|l| l.trim().to_string()).collect();

    if lines.len() != count + 1 {
        return Err(AppError::TranslationShapeMismatch {
            expected: count + 1,
            actual: lines.len(),
        });
    }

    Ok(lines.into_iter().skip(1).collect())
}

/// Translates transaction descriptions through a cache and a batch translator.
#[derive(Clone)]
pub struct TranslationService<C, T>
where
    C: TranslationCache,
    T: Translator,
{
    cache: C,
    translator: Option<(T, PromptTemplate)>,
    policy: RetryPolicy,
}

impl<C, T> TranslationService<C, T>
where
    C: TranslationCache,
    T: Translator,
{
    pub fn new(cache: C, translator: T, template: PromptTemplate) -> Self {
        Self {
            cache,
            translator: Some((translator, template)),
            policy: RetryPolicy::translation(),
        }
    }

    /// A service that never translates and never touches the cache.
    pub fn disabled(cache: C) -> Self {
        Self {
            cache,
            translator: None,
            policy: RetryPolicy::translation(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.translator.is_some()
    }

    /// Returns one translation slot per transaction, in input order.
    pub async fn translate(&self, txns: &[Transaction]) -> Vec<Option<String>> {
        let Some((translator, template)) = &self.translator else {
            return vec![None; txns.len()];
        };
        if txns.is_empty() {
            return Vec::new();
        }

        let sources: Vec<String> = txns.iter().map(Transaction::translation_source).collect();

        let mut seen = HashSet::new();
        let unique: Vec<String> = sources
            .iter()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect();

        let mut known: HashMap<String, String> = match self.cache.get_many(&unique).await {
            Ok(hits) => hits.into_iter().filter(|(_, t)| !t.is_empty()).collect(),
            Err(e) => {
                warn!(error = %e, "Translation cache lookup failed, treating all as misses");
                HashMap::new()
            }
        };

        let misses: Vec<String> = unique
            .into_iter()
            .filter(|s| !known.contains_key(s))
            .collect();

        debug!(
            total = txns.len(),
            cached = known.len(),
            misses = misses.len(),
            "Translation cache lookup complete"
        );

        if !misses.is_empty() {
            let prompt = template.render(&misses);
            let prompt = prompt.as_str();
            let count = misses.len();

            let result = self
                .policy
                .run("translation", move || async move {
                    let text = translator.complete(prompt).await?;
                    debug!(response = %text, "Translation response received");
                    parse_batch_response(&text, count)
                })
                .await;

            match result {
                Ok(translations) => {
                    for (source, translation) in misses.into_iter().zip(translations) {
                        if translation.is_empty() {
                            continue;
                        }
                        if let Err(e) = self.cache.put(&source, &translation).await {
                            warn!(description = %source, error = %e, "Failed to cache translation");
                        }
                        known.insert(source, translation);
                    }
                }
                Err(e) => {
                    error!(
                        descriptions = ?misses,
                        attempts = e.attempts,
                        error = %e.last_error,
                        "Failed to translate descriptions"
                    );
                }
            }
        }

        sources.iter().map(|s| known.get(s).cloned()).collect()
    }
}
