//! Transactional email through an HTTP email provider.
//!
//! Every notification the API sends is best effort: callers go through
//! [`send_best_effort`], which logs failures instead of returning them.

pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::error::EmailError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

pub struct EmailClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    from_address: String,
}

impl EmailClient {
    pub fn new(config: &EmailConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        }
    }
}

#[async_trait]
impl EmailSender for EmailClient {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let body = SendEmailRequest {
            from: &self.from_address,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(EmailError::Rejected(format!("{}: {}", status, detail)))
        }
    }
}

/// Sends `message`, logging instead of failing. Empty recipient lists are skipped.
pub async fn send_best_effort(sender: &dyn EmailSender, message: EmailMessage) {
    if message.to.is_empty() {
        return;
    }

    let subject = message.subject.clone();
    match sender.send(message).await {
        Ok(()) => info!(%subject, "Notification email sent"),
        Err(e) => warn!(%subject, error = %e, "Notification email failed"),
    }
}
