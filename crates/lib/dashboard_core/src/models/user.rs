//! Dashboard user accounts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::credential::validate_email;

/// Maximum length, in characters, of first and last names.
pub const USER_NAME_MAX_CHARS: usize = 64;

/// Administrative account state, orthogonal to email verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    #[default]
    Active,
    Locked,
}

impl UserState {
    pub fn as_str(self) -> &'static str {
        match self {
            UserState::Active => "active",
            UserState::Locked => "locked",
        }
    }
}

impl fmt::Display for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserState::Active),
            "locked" => Ok(UserState::Locked),
            other => Err(format!("unknown user state: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub create_at: DateTime<Utc>,
    pub update_at: DateTime<Utc>,
    pub email: String,
    pub email_verified: bool,
    /// bcrypt hash. Cleared by [`User::sanitize`] before leaving the service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub state: UserState,
    /// Derived from role membership on read; never persisted.
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    /// Validate profile fields. The email must already be lower-cased.
    pub fn validate(&self) -> Result<(), String> {
        validate_email(&self.email).map_err(|_| "invalid email".to_string())?;
        if self.first_name.chars().count() > USER_NAME_MAX_CHARS {
            return Err("invalid first name".into());
        }
        if self.last_name.chars().count() > USER_NAME_MAX_CHARS {
            return Err("invalid last name".into());
        }
        Ok(())
    }

    /// Clear sensitive data.
    pub fn sanitize(&mut self) {
        self.password.clear();
    }

    pub fn is_active(&self) -> bool {
        self.state == UserState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::new_id;

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: new_id(),
            create_at: now,
            update_at: now,
            email: email.into(),
            email_verified: false,
            password: "$2b$10$hash".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            state: UserState::Active,
            is_admin: false,
        }
    }

    #[test]
    fn sanitize_drops_password_from_json() {
        let mut u = user("a@x.com");
        u.sanitize();
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["state"], "active");
    }

    #[test]
    fn validate_checks_names_and_email() {
        assert!(user("a@x.com").validate().is_ok());
        assert!(user("A@x.com").validate().is_err());

        let mut long = user("a@x.com");
        long.first_name = "é".repeat(USER_NAME_MAX_CHARS + 1);
        assert!(long.validate().is_err());
    }
}
