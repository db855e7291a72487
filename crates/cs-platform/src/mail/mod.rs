//! Outbound Mail
//!
//! One [`Mailer`] contract with an AWS SES adapter for production, a logging
//! adapter for development and a recording adapter for tests.

pub mod templates;

use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use parking_lot::Mutex;
use tracing::info;

use crate::error::{PlatformError, Result};

pub use templates::{RenderedMail, Templates};

/// A fully rendered message for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, rendered: RenderedMail) -> Self {
        Self {
            to: to.into(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Sends through AWS SES v2 with HTML and plain-text parts.
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }

    /// Build a client from the standard AWS environment.
    pub async fn from_env(from: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(SesClient::new(&config), from)
    }
}

fn utf8(data: &str, part: &str) -> Result<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| PlatformError::mail(format!("Failed to build {}: {:?}", part, e)))
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let destination = Destination::builder().to_addresses(&message.to).build();

        let body = Body::builder()
            .html(utf8(&message.html, "HTML content")?)
            .text(utf8(&message.text, "text content")?)
            .build();

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(utf8(&message.subject, "subject")?)
                    .body(body)
                    .build(),
            )
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination)
            .content(content)
            .send()
            .await
            .map_err(|e| PlatformError::mail(format!("Failed to send email: {:?}", e)))?;

        info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Development mailer: logs instead of sending.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, "Email (log driver)");
        Ok(())
    }
}

/// Keeps every message in memory. Can be told to fail, to exercise the
/// best-effort paths.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    failing: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<MailMessage> {
        self.sent.lock().iter().filter(|m| m.to == to).cloned().collect()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        if *self.failing.lock() {
            return Err(PlatformError::mail("recording mailer set to fail"));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
