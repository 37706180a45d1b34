use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail API rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivery of a rendered e-mail. Building subject and body is the
/// caller's job.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[derive(Debug, Clone)]
pub struct Sender {
    pub address: String,
    pub name: String,
}

/// Posts messages as JSON to a transactional mail API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: url::Url,
    token: Option<String>,
    from: Sender,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: MailAddress<'a>,
    to: [MailAddress<'a>; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Serialize)]
struct MailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl HttpMailer {
    pub fn new(endpoint: url::Url, token: Option<String>, from: Sender) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            token,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let payload = MailPayload {
            from: MailAddress {
                email: &self.from.address,
                name: Some(&self.from.name),
            },
            to: [MailAddress {
                email: &message.to,
                name: None,
            }],
            subject: &message.subject,
            html: &message.html,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Logs messages instead of sending them. Used when no mail API is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "mail delivery disabled, message logged"
        );
        Ok(())
    }
}
