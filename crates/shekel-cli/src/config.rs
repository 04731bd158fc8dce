use clap::{ArgAction, Parser, ValueEnum};
use shekel_core::{AppError, DEFAULT_TIMEZONE, DbConfig, SyncConfig, TableNames, parse_timezone};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::Level;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown");
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "shekel-streamer")]
#[command(
    author,
    version = version_info(),
    about = "Scrapes bank transactions, translates them and posts new ones to Telegram"
)]
#[command(after_help = "Examples:
  shekel-streamer                           # Run on startup, then on TRANSACTION_SYNC_SCHEDULE
  shekel-streamer --once                    # One pass over all tasks, then exit
  shekel-streamer --tasks ./tasks.toml      # Read tasks from a file instead of USERS/... variables

Task variables (when no tasks file is used):
  USERS=dana,omer
  DANA_VISACAL_USERNAME=...  DANA_VISACAL_PASSWORD=...
  DANA_TELEGRAM_CHANNEL_ID=-100123")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = DbConfig::default().max_connections)]
    pub db_max_connections: u32,

    /// Table holding transaction records
    #[arg(long, env = "TRANSACTIONS_TABLE", default_value = "transactions")]
    pub transactions_table: String,

    /// Table holding the translation cache
    #[arg(long, env = "TRANSLATIONS_TABLE", default_value = "translations")]
    pub translations_table: String,

    /// How many days back each scrape starts
    #[arg(long, env = "SCRAPING_DAYS_COUNT", default_value_t = 7)]
    pub scraping_days_count: i64,

    /// Maximum transactions per translation request
    #[arg(long, env = "TRANSLATION_CHUNK_SIZE", default_value_t = 30)]
    pub translation_chunk_size: usize,

    /// IANA timezone for the schedule and notification dates
    #[arg(long, env = "DEFAULT_TIMEZONE", default_value = DEFAULT_TIMEZONE)]
    pub timezone: String,

    /// OpenAI API key (translation is disabled without it)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chat model used for translation
    #[arg(long, env = "GPT_MODEL_FAST")]
    pub gpt_model: Option<String>,

    /// Translation prompt; must contain <text_to_replace>
    #[arg(long, env = "GPT_TRANSLATION_PROMPT")]
    pub translation_prompt: Option<String>,

    /// Custom chat completions URL (for Azure OpenAI or proxies)
    #[arg(long, env = "OPENAI_ENDPOINT")]
    pub openai_endpoint: Option<String>,

    /// Telegram bot token (notifications are disabled without it)
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Base URL of the scraping sidecar
    #[arg(long, env = "SCRAPER_URL", default_value = "http://localhost:3000")]
    pub scraper_url: String,

    /// Cron expression, 5 or 6 fields (seconds first)
    #[arg(long, env = "TRANSACTION_SYNC_SCHEDULE")]
    pub schedule: Option<String>,

    /// Run all tasks once at startup before waiting for the schedule
    #[arg(long, env = "RUN_ON_STARTUP", default_value_t = true, action = ArgAction::Set)]
    pub run_on_startup: bool,

    /// Run all tasks once and exit
    #[arg(long)]
    pub once: bool,

    /// Path to a tasks.toml file (defaults to ~/.config/shekel-streamer/tasks.toml, then env vars)
    #[arg(long, env = "TASKS_CONFIG", value_name = "PATH")]
    pub tasks: Option<PathBuf>,

    /// Maximum log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: Level,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Config {
    pub fn table_names(&self) -> Result<TableNames, AppError> {
        TableNames::new(&self.transactions_table, &self.translations_table)
    }

    pub fn sync_config(&self) -> Result<SyncConfig, AppError> {
        Ok(SyncConfig::default()
            .with_lookback_days(self.scraping_days_count)
            .with_chunk_size(self.translation_chunk_size)
            .with_timezone(parse_timezone(&self.timezone)?))
    }

    /// API key, model and prompt, when all three are set and non-empty.
    pub fn translation_settings(&self) -> Option<(&str, &str, &str)> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }

        Some((
            non_empty(&self.openai_api_key)?,
            non_empty(&self.gpt_model)?,
            non_empty(&self.translation_prompt)?,
        ))
    }
}
