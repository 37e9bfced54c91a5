//! Outbound email.
//!
//! One [`MailSender`] implementation is selected at startup: SMTP when a
//! relay host is configured, otherwise the console transport that logs the
//! message instead of sending it (development mode). Every send is
//! best-effort at the call sites — a delivery failure never fails the
//! operation that triggered it.

pub mod console;
pub mod smtp;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MailConfig;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

/// Errors that can occur while sending mail.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The mail configuration is unusable.
    #[error("Mail configuration error: {0}")]
    InvalidConfig(String),

    /// A recipient or sender address failed to parse.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The transport refused or failed to deliver the message.
    #[error("Send failed: {0}")]
    Send(String),
}

/// A transport that can deliver a plain-text email.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Delivers a message.
    ///
    /// # Errors
    ///
    /// Returns an error when the address is invalid or the transport fails.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Builds the sender selected by the configuration.
///
/// # Errors
///
/// Returns an error when the SMTP settings are present but unusable.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn MailSender>, MailError> {
    match &config.smtp_host {
        Some(host) => {
            let mailer = SmtpMailer::new(
                host,
                config.smtp_port,
                config.smtp_username.clone(),
                config.smtp_password.clone(),
                &config.from,
            )?;
            tracing::info!(host = %host, port = config.smtp_port, "SMTP mail transport configured");
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::info!("No SMTP host configured, emails will be logged");
            Ok(Arc::new(ConsoleMailer::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailConfig;

    #[test]
    fn test_console_selected_without_smtp_host() {
        let config = MailConfig::default();
        assert!(config.smtp_host.is_none());
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_smtp_selected_with_host() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            ..MailConfig::default()
        };
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_from_address_rejected() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            from: "not an address".to_string(),
            ..MailConfig::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(MailError::InvalidAddress(_))
        ));
    }
}
