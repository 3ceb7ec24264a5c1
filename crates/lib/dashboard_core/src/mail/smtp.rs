//! SMTP mailer backed by lettre's async transport.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{MailError, Mailer};

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionSecurity {
    #[default]
    StartTls,
    Tls,
    /// Plaintext. Only for local relays and test servers.
    None,
}

impl FromStr for ConnectionSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" => Ok(Self::Tls),
            "none" | "" => Ok(Self::None),
            other => Err(format!("unknown smtp connection security: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: ConnectionSecurity,
    pub timeout: Duration,
    pub from_address: String,
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "localhost".into(),
            port: 587,
            username: None,
            password: None,
            security: ConnectionSecurity::StartTls,
            timeout: Duration::from_secs(10),
            from_address: "dashboard@localhost".into(),
            from_name: "Dashboard".into(),
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = match config.security {
            ConnectionSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
                    .map_err(|e| MailError::Transport(format!("smtp relay: {e}")))?
            }
            ConnectionSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
                .map_err(|e| MailError::Transport(format!("smtp relay: {e}")))?,
            ConnectionSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
            }
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let address: Address = config.from_address.parse().map_err(|e| MailError::Address {
            address: config.from_address.clone(),
            reason: format!("{e}"),
        })?;
        let name = Some(config.from_name.clone()).filter(|n| !n.is_empty());

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(name, address),
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let recipient: Mailbox = to.parse().map_err(|e| MailError::Address {
            address: to.to_string(),
            reason: format!("{e}"),
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(_)) => {
                debug!(to, subject, "mail sent");
                Ok(())
            }
            Ok(Err(e)) => Err(MailError::Transport(e.to_string())),
            Err(_) => Err(MailError::Timeout(self.timeout)),
        }
    }
}
