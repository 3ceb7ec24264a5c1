//! API server configuration.

use std::time::Duration;

use dashboard_core::accounts::{AccountsConfig, DEFAULT_GITHUB_AUTHORIZE_URL, GithubOAuthConfig};
use dashboard_core::auth::sweep::DEFAULT_SWEEP_INTERVAL;
use dashboard_core::mail::{ConnectionSecurity, SmtpConfig};
use dashboard_core::store::postgres::DEFAULT_QUERY_TIMEOUT;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Public URL of the dashboard, used in email links.
    pub site_url: String,
    /// Dev mode: log mail instead of sending it and log verification codes.
    pub dev: bool,
    pub smtp: SmtpConfig,
    /// GitHub OAuth app client id. OAuth connect is disabled when unset.
    pub github_client_id: Option<String>,
    pub github_authorize_url: String,
    /// Upper bound on a single store call.
    pub store_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            database_url: "postgres://localhost:5432/dashboard".into(),
            site_url: "http://localhost:3000".into(),
            dev: false,
            smtp: SmtpConfig::default(),
            github_client_id: None,
            github_authorize_url: DEFAULT_GITHUB_AUTHORIZE_URL.into(),
            store_timeout: DEFAULT_QUERY_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                         | Default                                  |
    /// |----------------------------------|------------------------------------------|
    /// | `DASHBOARD_BIND_ADDR`            | `127.0.0.1:3100`                         |
    /// | `DATABASE_URL`                   | `postgres://localhost:5432/dashboard`    |
    /// | `DASHBOARD_SITE_URL`             | `http://localhost:3000`                  |
    /// | `DASHBOARD_DEV`                  | `false`                                  |
    /// | `DASHBOARD_SMTP_SERVER`          | `localhost`                              |
    /// | `DASHBOARD_SMTP_PORT`            | `587`                                    |
    /// | `DASHBOARD_SMTP_USERNAME`        | unset                                    |
    /// | `DASHBOARD_SMTP_PASSWORD`        | unset                                    |
    /// | `DASHBOARD_SMTP_SECURITY`        | `starttls`                               |
    /// | `DASHBOARD_SMTP_TIMEOUT_SECS`    | `10`                                     |
    /// | `DASHBOARD_MAIL_FROM`            | `dashboard@localhost`                    |
    /// | `DASHBOARD_GITHUB_CLIENT_ID`     | unset                                    |
    /// | `DASHBOARD_STORE_TIMEOUT_SECS`   | `10`                                     |
    /// | `DASHBOARD_SWEEP_INTERVAL_SECS`  | `3600`                                   |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let smtp_defaults = SmtpConfig::default();
        Self {
            bind_addr: var("DASHBOARD_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            site_url: var("DASHBOARD_SITE_URL").unwrap_or(defaults.site_url),
            dev: var("DASHBOARD_DEV").is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes")),
            smtp: SmtpConfig {
                server: var("DASHBOARD_SMTP_SERVER").unwrap_or(smtp_defaults.server),
                port: parsed("DASHBOARD_SMTP_PORT").unwrap_or(smtp_defaults.port),
                username: var("DASHBOARD_SMTP_USERNAME"),
                password: var("DASHBOARD_SMTP_PASSWORD"),
                security: parsed::<ConnectionSecurity>("DASHBOARD_SMTP_SECURITY")
                    .unwrap_or(smtp_defaults.security),
                timeout: positive_secs(var("DASHBOARD_SMTP_TIMEOUT_SECS"))
                    .unwrap_or(smtp_defaults.timeout),
                from_address: var("DASHBOARD_MAIL_FROM").unwrap_or(smtp_defaults.from_address),
                from_name: var("DASHBOARD_MAIL_FROM_NAME").unwrap_or(smtp_defaults.from_name),
            },
            github_client_id: var("DASHBOARD_GITHUB_CLIENT_ID"),
            github_authorize_url: var("DASHBOARD_GITHUB_AUTHORIZE_URL")
                .unwrap_or(defaults.github_authorize_url),
            store_timeout: positive_secs(var("DASHBOARD_STORE_TIMEOUT_SECS"))
                .unwrap_or(defaults.store_timeout),
            sweep_interval: positive_secs(var("DASHBOARD_SWEEP_INTERVAL_SECS"))
                .unwrap_or(defaults.sweep_interval),
        }
    }

    /// Settings the account flows need.
    pub fn accounts_config(&self) -> AccountsConfig {
        AccountsConfig {
            site_url: self.site_url.trim_end_matches('/').to_string(),
            dev: self.dev,
            github: self.github_client_id.as_ref().map(|client_id| GithubOAuthConfig {
                client_id: client_id.clone(),
                authorize_url: self.github_authorize_url.clone(),
            }),
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Whole seconds, ignoring zero and garbage so the default applies.
fn positive_secs(value: Option<String>) -> Option<Duration> {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    var(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounts_config_trims_site_url_and_gates_github() {
        let config = ApiConfig {
            site_url: "https://dash.example.com/".into(),
            ..ApiConfig::default()
        };
        let accounts = config.accounts_config();
        assert_eq!(accounts.site_url, "https://dash.example.com");
        assert!(accounts.github.is_none());

        let config = ApiConfig {
            github_client_id: Some("abc".into()),
            ..config
        };
        let github = config.accounts_config().github.unwrap();
        assert_eq!(github.client_id, "abc");
        assert_eq!(github.authorize_url, DEFAULT_GITHUB_AUTHORIZE_URL);
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        assert_eq!(positive_secs(Some("0".into())), None);
        assert_eq!(positive_secs(Some("soon".into())), None);
        assert_eq!(positive_secs(None), None);
        assert_eq!(positive_secs(Some("90".into())), Some(Duration::from_secs(90)));
    }
}
