//! Anti-CSRF state for the OAuth authorization-code connect flow.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{new_id, random_string};

/// OAuth state lifetime: 10 minutes.
pub const OAUTH_STATE_TTL: Duration = Duration::minutes(10);

/// Length of the state nonce sent to the provider.
pub const OAUTH_STATE_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub id: Uuid,
    pub token: String,
    pub create_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            token: random_string(OAUTH_STATE_TOKEN_LENGTH),
            create_at: now,
            expires_at: now + OAUTH_STATE_TTL,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl Default for OAuthState {
    fn default() -> Self {
        Self::new()
    }
}
