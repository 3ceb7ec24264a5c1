//! Outbound mail.
//!
//! The account flows hand a rendered [`EmailMessage`] to a [`Mailer`]. The
//! SMTP mailer is used in production, the log mailer in dev mode and the
//! recording mailer in tests.

pub mod log;
pub mod memory;
pub mod smtp;
pub mod templates;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use log::LogMailer;
pub use memory::RecordingMailer;
pub use smtp::{ConnectionSecurity, SmtpConfig, SmtpMailer};
pub use templates::{EmailMessage, ResetPasswordProps, VerifyEmailProps};

/// Mail errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp transport error: {0}")]
    Transport(String),

    #[error("mail send timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends one HTML email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;

    /// Render and send a templated message.
    async fn send_message(&self, to: &str, message: &EmailMessage) -> Result<(), MailError> {
        self.send(to, message.subject(), &message.html_body()).await
    }
}
