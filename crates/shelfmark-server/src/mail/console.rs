//! Console mail transport for development.

use async_trait::async_trait;

use super::{MailError, MailSender};

/// Logs messages instead of delivering them.
#[derive(Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailSender for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        tracing::info!(
            to = %to,
            subject = %subject,
            body = %body,
            "Email (console transport)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_send_always_succeeds() {
        let mailer = ConsoleMailer::new();
        mailer
            .send("reader@example.com", "Subject", "Body")
            .await
            .unwrap();
    }
}
