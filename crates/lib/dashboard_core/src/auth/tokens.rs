//! One-time tokens for email verification and password reset.
//!
//! Issuing a token replaces any outstanding token of the same type for the
//! same email. Consuming one checks existence, freshness and type, returns
//! the bound email and deletes the row so it cannot be replayed.

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use super::{AuthError, Result, TokenRejection};
use crate::models::token::TOKEN_EXPIRY;
use crate::models::{Token, TokenExtraEmail, TokenType};
use crate::store::{Store, TokenStore};

/// Issue a new token of `token_type` bound to `email`.
pub async fn issue(store: &dyn Store, token_type: TokenType, email: &str) -> Result<Token> {
    store.delete_tokens_by_email(email, token_type).await?;

    let extra = TokenExtraEmail::encode(email)
        .map_err(|e| AuthError::Internal(format!("encode token extra: {e}")))?;
    let token = Token::new(token_type, extra);
    token.validate().map_err(AuthError::Validation)?;
    store.create_token(&token).await?;

    info!(token_type = %token_type, "issued token");
    Ok(token)
}

/// Look a token up by value.
pub async fn resolve(store: &dyn Store, value: &str) -> Result<Option<Token>> {
    Ok(store.get_token(value).await?)
}

/// Consume a token and return the email it was issued for.
///
/// Not-found, expired and wrong-type all fail with
/// [`AuthError::InvalidToken`]. A token whose payload cannot be decoded fails
/// with [`AuthError::CorruptToken`].
pub async fn consume(store: &dyn Store, value: &str, expected: TokenType) -> Result<String> {
    let Some(token) = resolve(store, value).await? else {
        return Err(reject(TokenRejection::NotFound));
    };

    if token.is_expired_at(Utc::now(), TOKEN_EXPIRY) {
        if let Err(e) = store.delete_token(&token.token).await {
            warn!(error = %e, "failed to delete expired token");
        }
        return Err(reject(TokenRejection::Expired));
    }

    if token.token_type != expected {
        return Err(reject(TokenRejection::WrongType {
            expected,
            actual: token.token_type,
        }));
    }

    let email = token.extra_email().map_err(|e| {
        warn!(token_type = %token.token_type, error = %e, "corrupt token payload");
        AuthError::CorruptToken(e)
    })?;

    store.delete_token(&token.token).await?;
    Ok(email)
}

/// Delete tokens older than `max_age`. Failures are logged, not returned.
pub async fn sweep(store: &dyn Store, max_age: Duration) {
    let cutoff = Utc::now() - max_age;
    match store.sweep_tokens_older_than(cutoff).await {
        Ok(0) => {}
        Ok(n) => info!(removed = n, "swept stale tokens"),
        Err(e) => error!(error = %e, "token sweep failed"),
    }
}

fn reject(reason: TokenRejection) -> AuthError {
    warn!(reason = %reason, "token rejected");
    AuthError::InvalidToken(reason)
}
