//! Runs a single sweep of due scheduled withdrawals and exits once their
//! notifications have been handed to the mailer. Meant for cron jobs and
//! manual runs alongside, or instead of, the API's built-in scheduler.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use redis_cache::DedupCache;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use withdraw_api::{
    clock::SystemClock,
    config::Config,
    domain::SchedulePolicy,
    engine::{EngineSettings, WithdrawEngine},
    notifications::{EmailTemplates, NotificationDispatcher},
    store::PgStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "withdraw_api=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db_pool = postgres_models::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    let redis_pool = redis_cache::create_pool(&config.redis_url)
        .await
        .context("Failed to create Redis pool")?;

    let (events_tx, events_rx) = mpsc::channel(config.notification_buffer);
    let dispatcher = NotificationDispatcher::new(
        Arc::new(DedupCache::new(redis_pool)),
        config.mail.mailer()?,
        EmailTemplates::new(config.utc_offset, config.mail.from_name.clone()),
        config.email_dedup_ttl,
    );
    let notifications = tokio::spawn(dispatcher.run(events_rx));

    let engine = WithdrawEngine::new(
        Arc::new(PgStorage::new(db_pool)),
        Arc::new(SystemClock),
        events_tx,
        EngineSettings {
            policy: SchedulePolicy::new(config.utc_offset, config.max_schedule_days),
            submit_deadline: config.submit_deadline,
        },
    );

    info!("processing scheduled withdraws");
    let processed = engine.sweep_due().await?;
    info!(processed, "scheduled withdraws processed");

    // Closes the channel so the dispatcher drains and stops.
    drop(engine);
    notifications.await?;

    Ok(())
}
