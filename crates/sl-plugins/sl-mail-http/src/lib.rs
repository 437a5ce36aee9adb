//! # sl-mail-http
//!
//! Transactional mail relay client implementing the `Mailer` port. The
//! relay exposes a single authenticated send endpoint; delivery is the
//! relay's problem. Fire-and-forget semantics (detached task, swallowed
//! errors) live in sl-services, not here; this client reports failures
//! honestly and lets the dispatcher decide what to do with them.

use async_trait::async_trait;
use serde::Serialize;

use sl_core::error::{AppError, Result};
use sl_core::traits::Mailer;

#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    /// Full URL of the relay's send API
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

pub struct HttpMailer {
    http: reqwest::Client,
    config: MailRelayConfig,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(config: MailRelayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, recipients: &[String], subject: &str, html: &str) -> Result<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        let body = SendRequest {
            from: &self.config.from_address,
            to: recipients,
            subject,
            html,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("mail relay unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "mail relay rejected send: {}",
                response.status()
            )));
        }

        tracing::debug!(count = recipients.len(), subject, "mail accepted by relay");
        Ok(())
    }
}
