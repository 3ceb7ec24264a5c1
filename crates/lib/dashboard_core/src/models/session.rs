//! Authenticated sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{new_id, random_string};

/// Session lifetime: 15 days, fixed at creation. Sessions are never renewed.
pub const SESSION_TTL: Duration = Duration::days(15);

/// Length of the bearer token handed to clients.
pub const SESSION_TOKEN_LENGTH: usize = 64;

/// Length of the CSRF token bound to a session.
pub const CSRF_TOKEN_LENGTH: usize = 32;

/// Server-side record proving a user is authenticated until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Bearer secret. Hand it back to the client; never log it.
    #[serde(skip_serializing, default)]
    pub token: String,
    pub user_id: Uuid,
    pub csrf_token: String,
    pub create_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Sessions minted for API keys must be explicitly allowed per route.
    pub api_key: bool,
}

impl Session {
    /// Build a new session for `user_id` with independently generated id,
    /// bearer token and CSRF token.
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            token: random_string(SESSION_TOKEN_LENGTH),
            user_id,
            csrf_token: random_string(CSRF_TOKEN_LENGTH),
            create_at: now,
            expires_at: now + SESSION_TTL,
            api_key: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
