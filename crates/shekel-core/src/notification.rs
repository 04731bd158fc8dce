//! Notification text and delivery.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Transaction, TransactionType};
use crate::retry::RetryPolicy;
use crate::traits::Notifier;

/// Renders a timestamp in `tz`, dropping the time part when it is exactly local midnight.
pub fn format_date(date: DateTime<Utc>, tz: Tz) -> String {
    let local = date.with_timezone(&tz);
    if local.hour() == 0 && local.minute() == 0 && local.second() == 0 {
        local.format("%Y-%m-%d").to_string()
    } else {
        local.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "ILS" | "NIS" => Some("₪"),
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        _ => None,
    }
}

/// Formats an amount like `-1,234.50 ₪`. Unknown currencies keep their ISO code.
pub fn format_amount(amount: f64, currency: &str) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // -0.001 rounds to 0.00 and must not print a sign
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    let unit = currency_symbol(currency).unwrap_or(currency);

    format!("{}{}.{} {}", sign, grouped, frac_part, unit)
}

const MARKDOWN_SPECIAL: [char; 4] = ['_', '*', '`', '['];

/// Renders `text` bold in Telegram's legacy Markdown.
///
/// That dialect has no escapes inside an entity, so each special character
/// closes the bold run and is emitted escaped between two runs.
fn bold(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut run = String::new();

    let flush = |out: &mut String, run: &mut String| {
        if !run.is_empty() {
            out.push('*');
            out.push_str(run);
            out.push('*');
            run.clear();
        }
    };

    for ch in text.chars() {
        if MARKDOWN_SPECIAL.contains(&ch) {
            flush(&mut out, &mut run);
            out.push('\\');
            out.push(ch);
        } else {
            run.push(ch);
        }
    }
    flush(&mut out, &mut run);

    out
}

/// Builds the Markdown message for one new transaction.
///
/// Bank-supplied text is escaped, so descriptions like `Caffe_Nero` render
/// as-is instead of breaking the message.
pub fn format_notification(txn: &Transaction, tz: Tz) -> String {
    let emoji = if txn.is_income() { "💰" } else { "💸" };

    let mut text = format!(
        "Account: {}\nAmount: {}\nDescription: {}\n",
        bold(&format!("{} {}", txn.account_number, emoji)),
        bold(&format_amount(txn.charged_amount, &txn.original_currency)),
        bold(&txn.translation_source()),
    );
    if let Some(translated) = &txn.translated_description {
        text.push_str(&format!("Description (EN): {}\n", bold(translated)));
    }
    text.push_str(&format!("Date: {}\n", bold(&format_date(txn.date, tz))));
    if let Some(identifier) = &txn.identifier {
        text.push_str(&format!("Id: {}\n", bold(identifier)));
    }

    text.push_str(&format!(
        "\nProcessed Date: {}\n",
        format_date(txn.processed_date, tz)
    ));
    if txn.txn_type != TransactionType::Normal {
        let kind = match txn.installments {
            Some(i) => format!("{} ({}/{})", txn.txn_type, i.number, i.total),
            None => txn.txn_type.to_string(),
        };
        text.push_str(&format!("Type: {}\n", kind));
    }
    text.push_str(&format!("Status: {}", txn.status));

    text
}

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No bot token or no channel id for the task.
    Skipped,
    /// Every attempt failed.
    Failed,
}

/// Delivers notifications for newly inserted transactions.
///
/// Without a notifier (no bot token) or without a channel id for the task,
/// delivery is a logged no-op.
#[derive(Clone)]
pub struct NotificationService<N: Notifier> {
    notifier: Option<N>,
    policy: RetryPolicy,
    timezone: Tz,
}

impl<N: Notifier> NotificationService<N> {
    pub fn new(notifier: Option<N>, timezone: Tz) -> Self {
        Self {
            notifier,
            policy: RetryPolicy::notification(),
            timezone,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sends the notification for `txn`, retrying under the notification policy.
    pub async fn notify(&self, txn: &Transaction, record_id: Uuid) -> Delivery {
        let (Some(notifier), Some(channel_id)) = (&self.notifier, txn.channel_id.as_deref())
        else {
            info!(%record_id, "No bot token or channel id, skipping notification");
            return Delivery::Skipped;
        };

        let text = format_notification(txn, self.timezone);
        let text = text.as_str();

        let result = self
            .policy
            .run("notification", move || notifier.send(channel_id, text))
            .await;

        match result {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                error!(
                    %record_id,
                    channel_id,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "Failed to send notification"
                );
                Delivery::Failed
            }
        }
    }
}
