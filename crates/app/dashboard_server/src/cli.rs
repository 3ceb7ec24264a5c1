use clap::{Args, Parser, Subcommand, ValueEnum};
use dashboard_api::config::ApiConfig;
use dashboard_core::mail::ConnectionSecurity;
use dashboard_core::models::RoleName;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dashboard", version, about = "Dashboard account server")]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run migrations, seed roles and serve the HTTP API.
    Server(ServerArgs),

    /// Administer user accounts.
    #[command(subcommand)]
    User(UserCommand),

    /// Print the version.
    Version,
}

/// Flags override the `DASHBOARD_*` environment.
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Address to listen on, e.g. 0.0.0.0:3100.
    #[arg(long)]
    pub listen: Option<String>,

    /// Public dashboard URL used in email links.
    #[arg(long)]
    pub site_url: Option<String>,

    /// Log mail instead of sending it.
    #[arg(long)]
    pub dev: bool,

    #[arg(long)]
    pub smtp_server: Option<String>,

    #[arg(long)]
    pub smtp_port: Option<u16>,

    #[arg(long)]
    pub smtp_username: Option<String>,

    #[arg(long, env = "DASHBOARD_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// starttls, tls or none.
    #[arg(long)]
    pub smtp_security: Option<ConnectionSecurity>,

    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub smtp_timeout_secs: Option<u64>,

    /// Sender address for outgoing mail.
    #[arg(long)]
    pub mail_from: Option<String>,

    /// GitHub OAuth app client id; enables /oauth/github/connect.
    #[arg(long)]
    pub github_client_id: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub store_timeout_secs: Option<u64>,

    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval_secs: Option<u64>,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut ApiConfig) {
        if let Some(listen) = &self.listen {
            config.bind_addr = listen.clone();
        }
        if let Some(site_url) = &self.site_url {
            config.site_url = site_url.clone();
        }
        config.dev |= self.dev;
        if let Some(server) = &self.smtp_server {
            config.smtp.server = server.clone();
        }
        if let Some(port) = self.smtp_port {
            config.smtp.port = port;
        }
        if self.smtp_username.is_some() {
            config.smtp.username = self.smtp_username.clone();
        }
        if self.smtp_password.is_some() {
            config.smtp.password = self.smtp_password.clone();
        }
        if let Some(security) = self.smtp_security {
            config.smtp.security = security;
        }
        if let Some(secs) = self.smtp_timeout_secs {
            config.smtp.timeout = Duration::from_secs(secs);
        }
        if let Some(from) = &self.mail_from {
            config.smtp.from_address = from.clone();
        }
        if self.github_client_id.is_some() {
            config.github_client_id = self.github_client_id.clone();
        }
        if let Some(secs) = self.store_timeout_secs {
            config.store_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.sweep_interval = Duration::from_secs(secs);
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create an account.
    New {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Extra role to grant besides `user`.
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
        /// Mark the email verified.
        #[arg(long)]
        email_verified: bool,
    },

    /// Grant or revoke roles.
    #[command(subcommand)]
    Role(RoleCommand),

    /// Lock an account; it can no longer log in.
    Lock {
        #[arg(long)]
        email: String,
    },

    /// Unlock a locked account.
    Unlock {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        role: RoleArg,
    },
    Remove {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        role: RoleArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for RoleName {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => RoleName::User,
            RoleArg::Admin => RoleName::Admin,
        }
    }
}
