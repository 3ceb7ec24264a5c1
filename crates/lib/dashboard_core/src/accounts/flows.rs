//! User-facing account flows.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::{NewUser, UserService};
use crate::auth::{AuthError, Result, TokenRejection, credential, oauth, tokens};
use crate::mail::{EmailMessage, Mailer, ResetPasswordProps, VerifyEmailProps};
use crate::models::{OAuthState, Session, TokenType, User};
use crate::store::Store;

pub const DEFAULT_GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";

#[derive(Debug, Clone)]
pub struct GithubOAuthConfig {
    pub client_id: String,
    pub authorize_url: String,
}

#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Public URL of the dashboard, used in email links.
    pub site_url: String,
    /// Dev mode logs verification codes.
    pub dev: bool,
    pub github: Option<GithubOAuthConfig>,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:3000".into(),
            dev: false,
            github: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Orchestrates sign-up, login, verification, password and profile flows.
#[derive(Clone)]
pub struct Accounts {
    users: Arc<dyn UserService>,
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    config: AccountsConfig,
}

impl Accounts {
    pub fn new(
        users: Arc<dyn UserService>,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        config: AccountsConfig,
    ) -> Self {
        Self {
            users,
            store,
            mailer,
            config,
        }
    }

    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.users
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    /// Create an unverified account and log it in.
    pub async fn sign_up(&self, input: SignUp) -> Result<(User, Session)> {
        let mut user = self
            .users
            .create(NewUser {
                email: input.email,
                password: input.password,
                first_name: input.first_name,
                last_name: input.last_name,
                email_verified: false,
                role: None,
            })
            .await?;
        let session = self.users.login(user.id).await?;
        user.sanitize();
        Ok((user, session))
    }

    /// Authenticate and start a session. A locked account is refused only
    /// after its credentials check out.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let mut user = self.users.authenticate_for_login(email, password).await?;
        if !user.is_active() {
            warn!(user_id = %user.id, "login attempt on locked account");
            return Err(AuthError::Locked);
        }
        let session = self.users.login(user.id).await?;
        user.sanitize();
        Ok((user, session))
    }

    /// Destroy the current session, if any. Never fails.
    pub async fn logout(&self, session: Option<&Session>) {
        let Some(session) = session else {
            return;
        };
        if let Err(e) = self.users.logout(session.id).await {
            warn!(session_id = %session.id, error = %e.detail(), "failed to destroy session on logout");
        }
    }

    /// Issue a verify-email code for an unverified account and mail it.
    pub async fn start_email_verification(&self, user_id: Uuid) -> Result<()> {
        let user = self.require_user(user_id).await?;
        if user.email_verified {
            return Err(AuthError::Validation("user email is already verified".into()));
        }
        self.send_verification(&user.email).await
    }

    /// Consume a verify-email code and mark the owning account verified.
    pub async fn complete_email_verification(&self, token: &str) -> Result<()> {
        let email = tokens::consume(self.store.as_ref(), token, TokenType::VerifyEmail).await?;
        let Some(user) = self.users.get_by_email(&email).await? else {
            warn!(email = %email, "verify-email token for unknown account");
            return Err(AuthError::InvalidToken(TokenRejection::UnknownAccount));
        };
        self.users.verify_email(user.id).await
    }

    /// Start a password reset. Succeeds whether or not the account exists.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let email = credential::normalize_email(email);
        let Some(user) = self.users.get_by_email(&email).await? else {
            debug!(email = %email, "password reset requested for unknown email");
            return Ok(());
        };

        let token = tokens::issue(self.store.as_ref(), TokenType::ResetPassword, &user.email).await?;
        let message = EmailMessage::ResetPassword(ResetPasswordProps::new(
            &self.config.site_url,
            &token.token,
        ));
        self.mailer
            .send_message(&user.email, &message)
            .await
            .inspect_err(|e| warn!(user_id = %user.id, error = %e, "reset token issued but mail failed"))?;
        info!(user_id = %user.id, "password reset email sent");
        Ok(())
    }

    /// Consume a reset token and set a new password. Every session of the
    /// account is destroyed.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        credential::validate_password(new_password)?;
        let email = tokens::consume(self.store.as_ref(), token, TokenType::ResetPassword).await?;
        let Some(user) = self.users.get_by_email(&email).await? else {
            warn!(email = %email, "reset token for unknown account");
            return Err(AuthError::InvalidToken(TokenRejection::UnknownAccount));
        };
        self.users.update_password(user.id, new_password).await
    }

    /// Change the password of the session's user.
    ///
    /// A wrong current password is [`AuthError::Forbidden`] and leaves every
    /// session in place. On success all sessions are destroyed and a new one
    /// is returned; `None` means the password changed but re-login failed.
    pub async fn change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<Option<Session>> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "current and new password are required".into(),
            ));
        }
        credential::validate_password(new_password)?;

        let user = self.require_session_user(session).await?;
        self.users
            .authenticate_for_login(&user.email, current_password)
            .await
            .map_err(|e| match e {
                AuthError::InvalidCredentials(reason) => AuthError::Forbidden(reason),
                other => other,
            })?;

        self.users.update_password(user.id, new_password).await?;

        match self.users.login(user.id).await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(user_id = %user.id, error = %e.detail(), "password changed but re-login failed");
                Ok(None)
            }
        }
    }

    /// Update the session user's profile. A new email address is marked
    /// unverified and a fresh verification code is mailed to it.
    pub async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<User> {
        if update.id != session.user_id {
            return Err(AuthError::Validation("user id does not match session".into()));
        }
        let current = self.require_session_user(session).await?;

        let email = credential::normalize_email(&update.email);
        credential::validate_email(&email)?;
        let email_changed = email != current.email;

        let candidate = User {
            email,
            first_name: update.first_name,
            last_name: update.last_name,
            ..current
        };
        let mut updated = self.users.update(&candidate).await?;

        if email_changed {
            info!(user_id = %updated.id, "email changed, verification required");
            self.users.unverify_email(updated.id).await?;
            updated.email_verified = false;
            self.send_verification(&updated.email).await?;
        }

        updated.sanitize();
        Ok(updated)
    }

    /// The session's own account, sanitized.
    pub async fn me(&self, session: &Session) -> Result<User> {
        let mut user = self.require_session_user(session).await?;
        user.sanitize();
        Ok(user)
    }

    /// Any account by id, sanitized. Admin routes only.
    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        let mut user = self.require_user(id).await?;
        user.sanitize();
        Ok(user)
    }

    /// Create an anti-forgery state and return the provider URL to redirect
    /// the browser to.
    pub async fn start_oauth_connect(&self) -> Result<(OAuthState, Url)> {
        let Some(github) = &self.config.github else {
            return Err(AuthError::Internal("github oauth is not configured".into()));
        };
        let mut url = Url::parse(&github.authorize_url)
            .map_err(|e| AuthError::Internal(format!("github authorize url: {e}")))?;

        let state = oauth::create_state(self.store.as_ref()).await?;
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("client_id", &github.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", "user:email read:org")
            .append_pair("state", &state.token);
        Ok((state, url))
    }

    async fn send_verification(&self, email: &str) -> Result<()> {
        let token = tokens::issue(self.store.as_ref(), TokenType::VerifyEmail, email).await?;
        if self.config.dev {
            debug!(email, code = %token.token, "verification code");
        }
        let message = EmailMessage::VerifyEmail(VerifyEmailProps {
            site_url: self.config.site_url.clone(),
            token: token.token,
        });
        self.mailer
            .send_message(email, &message)
            .await
            .inspect_err(|e| warn!(email, error = %e, "verify token issued but mail failed"))?;
        Ok(())
    }

    async fn require_user(&self, id: Uuid) -> Result<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))
    }

    async fn require_session_user(&self, session: &Session) -> Result<User> {
        self.users.get(session.user_id).await?.ok_or_else(|| {
            AuthError::InvalidSession(format!("session {} names a missing user", session.id))
        })
    }
}
