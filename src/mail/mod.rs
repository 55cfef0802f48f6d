//! Outbound email.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{MailConfig, SmtpTls};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Verification email carrying the OTP.
pub fn otp_email(from: &str, to: &str, otp: &str, ttl: Duration) -> EmailMessage {
    let minutes = (ttl.as_secs() / 60).max(1);
    let html = format!(
        "<html><body>\
         <p>Your verification code is:</p>\
         <h2 style=\"letter-spacing:4px\">{otp}</h2>\
         <p>The code expires in {minutes} minutes. If you did not request it, ignore this email.</p>\
         </body></html>"
    );
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Verify your email address".to_string(),
        html,
    }
}

/// Renders an [`EmailMessage`] as an HTML MIME message.
pub fn build_message(message: &EmailMessage) -> Result<Message, MailError> {
    Ok(Message::builder()
        .from(message.from.parse::<Mailbox>()?)
        .to(message.to.parse::<Mailbox>()?)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())?)
}

/// Delivers through an SMTP relay with optional credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self, MailError> {
        let builder = match config.smtp_tls {
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let mut builder = builder.port(config.smtp_port).timeout(Some(Duration::from_secs(10)));
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self { transport: builder.build() })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let email = build_message(&message)?;
        self.transport.send(email).await?;
        info!("Sent '{}' to {}", message.subject, message.to);
        Ok(())
    }
}

/// Logs instead of sending. Used when no SMTP host is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        warn!("No SMTP host configured; dropping '{}' to {}", message.subject, message.to);
        debug!(body = %message.html, "email body");
        Ok(())
    }
}

pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    // a bad sender address should stop startup, not the first registration
    config.from.parse::<Mailbox>()?;
    match &config.smtp_host {
        Some(host) => {
            info!("Sending mail through {}:{} ({:?})", host, config.smtp_port, config.smtp_tls);
            Ok(Arc::new(SmtpMailer::new(config, host)?))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_email_contains_code_and_expiry() {
        let message = otp_email("no-reply@x.io", "a@b.c", "042917", Duration::from_secs(300));
        assert_eq!(message.to, "a@b.c");
        assert!(message.html.contains("042917"));
        assert!(message.html.contains("5 minutes"));
    }

    #[test]
    fn builds_html_mime_message() {
        let message = otp_email("Yalp <no-reply@x.io>", "a@b.co", "042917", Duration::from_secs(300));
        let raw = String::from_utf8(build_message(&message).unwrap().formatted()).unwrap();
        assert!(raw.contains("To: a@b.co"));
        assert!(raw.contains("Subject: Verify your email address"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn rejects_malformed_recipient() {
        let message = otp_email("no-reply@x.io", "not an address", "000000", Duration::from_secs(60));
        assert!(matches!(build_message(&message), Err(MailError::Address(_))));
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        let message = otp_email("no-reply@x.io", "a@b.c", "000000", Duration::from_secs(60));
        assert!(LogMailer.send(message).await.is_ok());
    }

    #[test]
    fn falls_back_to_log_mailer_without_host() {
        assert!(from_config(&MailConfig::default()).is_ok());

        let config = MailConfig { from: "nobody".to_string(), ..Default::default() };
        assert!(matches!(from_config(&config), Err(MailError::Address(_))));
    }

    #[tokio::test]
    async fn builds_smtp_transport_for_each_tls_mode() {
        for tls in [SmtpTls::StartTls, SmtpTls::Tls, SmtpTls::None] {
            let config = MailConfig {
                smtp_host: Some("smtp.example.com".to_string()),
                smtp_user: Some("mailer".to_string()),
                smtp_pass: Some("secret".to_string()),
                smtp_tls: tls,
                ..Default::default()
            };
            assert!(from_config(&config).is_ok(), "{:?}", tls);
        }
    }
}
