use anyhow::{anyhow, bail, Context, Result};
use chrono::FixedOffset;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::notifications::{HttpMailer, LogMailer, MailError, Mailer, Sender, DEFAULT_DEDUP_TTL};
use crate::scheduler::DEFAULT_SWEEP_INTERVAL;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub environment: String,
    pub utc_offset: FixedOffset,
    pub sweep_interval: Duration,
    pub max_schedule_days: i64,
    pub email_dedup_ttl: Duration,
    pub submit_deadline: Duration,
    pub notification_buffer: usize,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Without an endpoint, e-mails are logged instead of sent.
    pub api_url: Option<url::Url>,
    pub api_token: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. A zero sweep interval or
    /// notification buffer is rejected; tokio panics on either.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let utc_offset = var_or(&var, "APP_UTC_OFFSET", "-03:00");
        let utc_offset = FixedOffset::from_str(&utc_offset)
            .map_err(|e| anyhow!("APP_UTC_OFFSET '{utc_offset}' is not a valid offset: {e}"))?;

        let api_url = var("MAIL_API_URL")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| url::Url::parse(&raw).with_context(|| format!("MAIL_API_URL '{raw}' is not a valid URL")))
            .transpose()?;

        Ok(Self {
            port: parse_var(&var, "PORT", 3000)?,
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: var_or(&var, "REDIS_URL", "redis://localhost:6379"),
            environment: var_or(&var, "ENVIRONMENT", "development"),
            utc_offset,
            sweep_interval: Duration::from_secs(parse_positive(
                &var,
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL.as_secs(),
            )?),
            max_schedule_days: parse_var(&var, "MAX_SCHEDULE_DAYS", 7)?,
            email_dedup_ttl: Duration::from_secs(parse_var(
                &var,
                "EMAIL_DEDUP_TTL_SECS",
                DEFAULT_DEDUP_TTL.as_secs(),
            )?),
            submit_deadline: Duration::from_millis(parse_var(&var, "SUBMIT_DEADLINE_MS", 5000)?),
            notification_buffer: parse_positive(&var, "NOTIFICATION_BUFFER", 1024)?,
            mail: MailConfig {
                api_url,
                api_token: var("MAIL_API_TOKEN").filter(|t| !t.is_empty()),
                from_address: var_or(&var, "MAIL_FROM_ADDRESS", "noreply@pix-withdraw.local"),
                from_name: var_or(&var, "MAIL_FROM_NAME", "PIX Withdrawals"),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl MailConfig {
    pub fn mailer(&self) -> Result<Arc<dyn Mailer>, MailError> {
        let mailer: Arc<dyn Mailer> = match &self.api_url {
            Some(endpoint) => Arc::new(HttpMailer::new(
                endpoint.clone(),
                self.api_token.clone(),
                Sender {
                    address: self.from_address.clone(),
                    name: self.from_name.clone(),
                },
            )?),
            None => Arc::new(LogMailer),
        };
        Ok(mailer)
    }
}

fn var_or(var: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_positive<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_var(var, name, default)?;
    if value == T::default() {
        bail!("{name} must be greater than zero");
    }
    Ok(value)
}
