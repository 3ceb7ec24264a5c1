//! Dev-mode mailer that writes to the log instead of sending.

use async_trait::async_trait;
use tracing::info;

use super::{MailError, Mailer};

#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        info!(to, subject, bytes = html_body.len(), "mail not sent (log mailer)");
        Ok(())
    }
}
