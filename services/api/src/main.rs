use anyhow::{Context, Result};
use dotenvy::dotenv;
use redis_cache::DedupCache;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use withdraw_api::{
    app,
    clock::SystemClock,
    config::Config,
    domain::SchedulePolicy,
    engine::{EngineSettings, WithdrawEngine},
    notifications::{EmailTemplates, NotificationDispatcher},
    scheduler,
    store::PgStorage,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "withdraw_api=debug,tower_http=debug".into()),
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

    let engine = WithdrawEngine::new(
        Arc::new(PgStorage::new(db_pool)),
        Arc::new(SystemClock),
        events_tx,
        EngineSettings {
            policy: SchedulePolicy::new(config.utc_offset, config.max_schedule_days),
            submit_deadline: config.submit_deadline,
        },
    );

    if config.mail.api_url.is_none() && config.is_production() {
        warn!("MAIL_API_URL is not set, notifications will only be logged");
    }
    let dispatcher = NotificationDispatcher::new(
        Arc::new(DedupCache::new(redis_pool)),
        config.mail.mailer()?,
        EmailTemplates::new(config.utc_offset, config.mail.from_name.clone()),
        config.email_dedup_ttl,
    );

    tokio::spawn(dispatcher.run(events_rx));
    tokio::spawn(scheduler::run(engine.clone(), config.sweep_interval));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, environment = %config.environment, "starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(AppState::new(engine))).await?;

    Ok(())
}
