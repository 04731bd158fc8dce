use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use shekel_client::{OpenAIClient, ScraperClient, TelegramClient};
use shekel_core::{
    BatchSyncSummary, NotificationService, PromptTemplate, SyncService, TaskRegistry,
    TranslationService, load_tasks_config,
};
use shekel_db::{TransactionRepository, TranslationRepository, ensure_schema};
use shekel_streamer::{Config, LogFormat, SyncRunner, normalize_cron};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::parse();
    init_tracing(&config)?;

    let tables = config.table_names()?;
    let sync_config = config.sync_config()?;

    let schedule = if config.once {
        None
    } else {
        let raw = config.schedule.as_deref().ok_or_else(|| {
            anyhow::anyhow!("TRANSACTION_SYNC_SCHEDULE is required unless --once is given")
        })?;
        Some(normalize_cron(raw)?)
    };

    let registry = load_registry(config.tasks.clone())?;
    if registry.is_empty() {
        anyhow::bail!(
            "No runnable sync tasks. Set USERS and {{USER}}_{{COMPANY}}_* variables or provide --tasks"
        );
    }
    info!(tasks = registry.len(), "Task registry loaded");

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    ensure_schema(&pool, &tables)
        .await
        .context("Failed to prepare database schema")?;

    let store = TransactionRepository::new(pool.clone(), &tables);
    let cache = TranslationRepository::new(pool, &tables);

    let translation = match build_translator(&config)? {
        Some((client, template)) => {
            info!(model = client.model(), "Translation enabled");
            TranslationService::new(cache, client, template)
        }
        None => {
            warn!(
                "Translation disabled: set OPENAI_API_KEY, GPT_MODEL_FAST and GPT_TRANSLATION_PROMPT to enable it"
            );
            TranslationService::disabled(cache)
        }
    };

    let telegram = match config.telegram_bot_token.as_deref() {
        Some(token) if !token.trim().is_empty() => {
            Some(TelegramClient::new(token).context("Failed to initialize Telegram client")?)
        }
        _ => {
            warn!("TELEGRAM_BOT_TOKEN is not set, notifications disabled");
            None
        }
    };
    let notification = NotificationService::new(telegram, sync_config.timezone);

    let scraper =
        ScraperClient::new(&config.scraper_url).context("Failed to initialize scraper client")?;

    let timezone = sync_config.timezone;
    let service = SyncService::new(store, scraper, translation, notification, sync_config);
    let runner = SyncRunner::new(service, registry);

    let Some(cron) = schedule else {
        if let Some(summary) = runner.run("once").await {
            print_batch_summary(&summary);
        }
        return Ok(());
    };

    if config.run_on_startup {
        runner.run("startup").await;
    }

    let mut scheduler = JobScheduler::new().await.context("creating scheduler")?;
    let job_runner = runner.clone();
    let job = Job::new_async_tz(cron.as_str(), timezone, move |_uuid, _lock| {
        let runner = job_runner.clone();
        Box::pin(async move {
            runner.run("schedule").await;
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    scheduler.add(job).await.context("adding scheduler job")?;
    scheduler.start().await.context("starting scheduler")?;

    info!(schedule = %cron, timezone = %timezone, "Scheduler started");

    shutdown_signal().await;

    info!("Shutdown signal received, waiting for the current run to finish...");
    runner.shutdown().await;
    scheduler.shutdown().await.context("stopping scheduler")?;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    }
    .context("setting default subscriber failed")
}

/// Tasks come from the tasks file when one exists, else from the environment.
fn load_registry(path: Option<PathBuf>) -> anyhow::Result<TaskRegistry> {
    match load_tasks_config(path)? {
        Some(tasks_config) => Ok(TaskRegistry::from_config(&tasks_config)),
        None => TaskRegistry::from_env().context("Failed to read tasks from environment"),
    }
}

fn build_translator(config: &Config) -> anyhow::Result<Option<(OpenAIClient, PromptTemplate)>> {
    let Some((api_key, model, prompt)) = config.translation_settings() else {
        return Ok(None);
    };

    let template = match PromptTemplate::new(prompt) {
        Ok(template) => template,
        Err(e) => {
            warn!(error = %e, "GPT_TRANSLATION_PROMPT is unusable");
            return Ok(None);
        }
    };

    let client = OpenAIClient::with_config(api_key, model, config.openai_endpoint.as_deref())
        .context("Failed to initialize OpenAI client")?;

    Ok(Some((client, template)))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print a summary of a one-off run.
fn print_batch_summary(summary: &BatchSyncSummary) {
    info!("═══════════════════════════════════════════════════════");
    info!("SYNC RUN COMPLETE");
    info!("═══════════════════════════════════════════════════════");
    info!("  Tasks processed:     {}", summary.total_tasks());
    info!("  Successful:          {}", summary.successful_count());
    info!("  Failed:              {}", summary.failed_count());
    info!("  New transactions:    {}", summary.total_created());
    info!("  Updated:             {}", summary.total_updated());

    if summary.failed_count() > 0 {
        info!("───────────────────────────────────────────────────────");
        info!("Failed tasks:");
        for result in summary.results.iter().filter(|r| !r.is_success()) {
            if let Some(err) = &result.error {
                error!("  - {}: {}", result.task_key, err);
            }
        }
    }
    info!("═══════════════════════════════════════════════════════");
}
