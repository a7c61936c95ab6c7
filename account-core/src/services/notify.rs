//! Outbound notification collaborators.
//!
//! Delivery is fire-and-forget from the account state machine's point of
//! view: a failed send is logged and recorded, never turned into an
//! authentication error.

use crate::config::SmtpConfig;
use crate::services::error::ServiceError;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::time::Duration;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, number: &str, text: &str) -> Result<(), ServiceError>;
}

/// SMTP-backed email sender.
#[derive(Clone)]
pub struct SmtpEmailSender {
    mailer: SmtpTransport,
    from_address: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::Notification(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email sender initialized");

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        ServiceError::Notification(e.to_string())
                    })?,
            )
            .to(to.parse().map_err(|e: lettre::address::AddressError| {
                ServiceError::Notification(e.to_string())
            })?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ServiceError::Notification(e.to_string()))?;

        // Send on the blocking pool so the SMTP round trip never stalls the
        // async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to send email");
                Err(ServiceError::Notification(e.to_string()))
            }
        }
    }
}

/// SMS sender that drops messages on the floor. Stands in until a real
/// gateway is wired up; the challenge flow treats it like any other
/// delivery channel.
#[derive(Debug, Clone, Default)]
pub struct EmptySmsSender;

#[async_trait]
impl SmsSender for EmptySmsSender {
    async fn send_sms(&self, number: &str, _text: &str) -> Result<(), ServiceError> {
        tracing::debug!(number = %number, "SMS delivery skipped (no gateway configured)");
        Ok(())
    }
}

/// No-op email sender for tests.
#[derive(Debug, Clone, Default)]
pub struct MockEmailSender;

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send_email(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), ServiceError> {
        Ok(())
    }
}
