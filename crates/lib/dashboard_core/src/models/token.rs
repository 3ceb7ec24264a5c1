//! One-time-use expiring tokens for email verification and password reset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{random_digits, random_string};

/// Length of a password-reset token (alphanumeric).
pub const TOKEN_SIZE: usize = 64;

/// Length of an email-verification code (digits).
pub const TOKEN_SIZE_DIGITS: usize = 6;

/// Tokens older than this are rejected at consumption and swept from storage.
pub const TOKEN_EXPIRY: Duration = Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    VerifyEmail,
    ResetPassword,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::VerifyEmail => "verify_email",
            TokenType::ResetPassword => "reset_password",
        }
    }

    /// Expected length of a token value of this type.
    pub fn value_len(self) -> usize {
        match self {
            TokenType::VerifyEmail => TOKEN_SIZE_DIGITS,
            TokenType::ResetPassword => TOKEN_SIZE,
        }
    }

    fn generate_value(self) -> String {
        match self {
            TokenType::VerifyEmail => random_digits(TOKEN_SIZE_DIGITS),
            TokenType::ResetPassword => random_string(TOKEN_SIZE),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verify_email" => Ok(TokenType::VerifyEmail),
            "reset_password" => Ok(TokenType::ResetPassword),
            other => Err(format!("unsupported token type: ({other})")),
        }
    }
}

/// Opaque payload carried by email tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExtraEmail {
    pub email: String,
}

impl TokenExtraEmail {
    /// Serialize the payload the way it is stored in the `extra` column.
    pub fn encode(email: &str) -> Result<String, serde_json::Error> {
        serde_json::to_string(&TokenExtraEmail {
            email: email.to_string(),
        })
    }
}

/// A one-time token row. Expiry is relative to `create_at`, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub create_at: DateTime<Utc>,
    pub token_type: TokenType,
    pub extra: String,
}

impl Token {
    /// Build a fresh token of `token_type` carrying `extra`.
    pub fn new(token_type: TokenType, extra: String) -> Self {
        Self {
            token: token_type.generate_value(),
            create_at: Utc::now(),
            token_type,
            extra,
        }
    }

    /// Check the value length and charset against the token type.
    pub fn validate(&self) -> Result<(), String> {
        let expected = self.token_type.value_len();
        if self.token.len() != expected {
            return Err(format!(
                "token length ({}) was expected to be {expected}",
                self.token.len()
            ));
        }
        let charset_ok = match self.token_type {
            TokenType::VerifyEmail => self.token.chars().all(|c| c.is_ascii_digit()),
            TokenType::ResetPassword => self.token.chars().all(|c| c.is_ascii_alphanumeric()),
        };
        if !charset_ok {
            return Err(format!("token has invalid characters for {}", self.token_type));
        }
        Ok(())
    }

    /// Whether the token is older than `max_age` at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.create_at < now - max_age
    }

    /// Extract the email address from the `extra` payload.
    pub fn extra_email(&self) -> Result<String, String> {
        let extra: TokenExtraEmail = serde_json::from_str(&self.extra)
            .map_err(|e| format!("unable to unmarshal extra field: {e}"))?;
        if extra.email.is_empty() {
            return Err("email value is empty".into());
        }
        Ok(extra.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extra(email: &str) -> String {
        TokenExtraEmail::encode(email).unwrap()
    }

    #[test]
    fn verify_email_tokens_are_six_digits() {
        let token = Token::new(TokenType::VerifyEmail, extra("a@x.com"));
        assert_eq!(token.token.len(), 6);
        assert!(token.token.chars().all(|c| c.is_ascii_digit()));
        assert!(token.validate().is_ok());
    }

    #[test]
    fn reset_tokens_are_sixty_four_alphanumerics() {
        let token = Token::new(TokenType::ResetPassword, extra("a@x.com"));
        assert_eq!(token.token.len(), 64);
        assert!(token.validate().is_ok());
    }

    #[test]
    fn validate_rejects_wrong_length() {
        let mut token = Token::new(TokenType::VerifyEmail, extra("a@x.com"));
        token.token.push('1');
        assert!(token.validate().is_err());
    }

    #[test]
    fn extra_email_round_trips() {
        let token = Token::new(TokenType::ResetPassword, extra("a@x.com"));
        assert_eq!(token.extra_email().unwrap(), "a@x.com");
    }

    #[test]
    fn extra_email_rejects_garbage_and_empty() {
        let mut token = Token::new(TokenType::ResetPassword, "not json".into());
        assert!(token.extra_email().is_err());
        token.extra = extra("");
        assert!(token.extra_email().is_err());
    }

    #[test]
    fn expiry_is_relative_to_creation() {
        let token = Token::new(TokenType::VerifyEmail, extra("a@x.com"));
        let now = token.create_at;
        assert!(!token.is_expired_at(now, TOKEN_EXPIRY));
        assert!(token.is_expired_at(now + Duration::hours(25), TOKEN_EXPIRY));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!("change_password".parse::<TokenType>().is_err());
    }
}
