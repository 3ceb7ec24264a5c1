//! In-memory store.
//!
//! Implements every store trait over plain collections. Used as the test
//! double for the auth core and the HTTP layer, and handy for local runs
//! without PostgreSQL. Data is lost when the store is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    Lookup, OAuthStateStore, Result, RoleStore, SessionStore, Store, StoreError, TokenStore,
    UserStore,
};
use crate::models::{
    OAuthState, Role, RoleName, Session, Token, TokenExtraEmail, TokenType, User, UserRole,
    UserState,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    tokens: HashMap<String, Token>,
    roles: HashMap<Uuid, Role>,
    user_roles: HashSet<UserRole>,
    oauth_states: HashMap<Uuid, OAuthState>,
}

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every call fails with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn peek(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored sessions belonging to `user_id`.
    pub fn session_count_for_user(&self, user_id: Uuid) -> usize {
        self.peek()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }

    /// Whether a session row with `id` is still stored, expired or not.
    pub fn contains_session(&self, id: Uuid) -> bool {
        self.peek().sessions.contains_key(&id)
    }

    /// Number of stored tokens whose payload names `email`, of any type.
    pub fn token_count_for_email(&self, email: &str) -> usize {
        self.peek()
            .tokens
            .values()
            .filter(|t| t.extra_email().is_ok_and(|e| e == email))
            .count()
    }

    /// Latest stored token of `token_type` for `email`, if any.
    pub fn latest_token_for_email(&self, email: &str, token_type: TokenType) -> Option<Token> {
        self.peek()
            .tokens
            .values()
            .filter(|t| t.token_type == token_type && t.extra_email().is_ok_and(|e| e == email))
            .max_by_key(|t| t.create_at)
            .cloned()
    }

    pub fn role_count(&self) -> usize {
        self.peek().roles.len()
    }

    fn role_id(tables: &Tables, name: RoleName) -> Option<Uuid> {
        tables
            .roles
            .values()
            .find(|r| r.name == name.as_str())
            .map(|r| r.id)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::AlreadyExists("email".into()));
        }
        let mut stored = user.clone();
        stored.is_admin = false;
        t.users.insert(user.id, stored);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables()?;
        if t
            .users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(StoreError::AlreadyExists("email".into()));
        }
        if let Some(stored) = t.users.get_mut(&user.id) {
            stored.email = user.email.clone();
            stored.first_name = user.first_name.clone();
            stored.last_name = user.last_name.clone();
            stored.update_at = Utc::now();
        }
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        if let Some(stored) = self.tables()?.users.get_mut(&id) {
            stored.password = password_hash.to_string();
            stored.update_at = Utc::now();
        }
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<()> {
        if let Some(stored) = self.tables()?.users.get_mut(&id) {
            stored.email_verified = verified;
            stored.update_at = Utc::now();
        }
        Ok(())
    }

    async fn set_user_state(&self, id: Uuid, state: UserState) -> Result<()> {
        if let Some(stored) = self.tables()?.users.get_mut(&id) {
            stored.state = state;
            stored.update_at = Utc::now();
        }
        Ok(())
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.tables()?.users.len() as i64)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut t = self.tables()?;
        if t.sessions.contains_key(&session.id)
            || t.sessions.values().any(|s| s.token == session.token)
        {
            return Err(StoreError::AlreadyExists("session".into()));
        }
        t.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, lookup: &Lookup) -> Result<Option<Session>> {
        let t = self.tables()?;
        let found = match lookup {
            Lookup::ById(id) => t.sessions.get(id),
            Lookup::ByToken(token) => t.sessions.values().find(|s| &s.token == token),
        };
        Ok(found.cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        self.tables()?.sessions.remove(&id);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<()> {
        self.tables()?.sessions.retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut t = self.tables()?;
        let before = t.sessions.len();
        t.sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - t.sessions.len()) as u64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create_token(&self, token: &Token) -> Result<()> {
        let mut t = self.tables()?;
        if t.tokens.contains_key(&token.token) {
            return Err(StoreError::AlreadyExists("token".into()));
        }
        t.tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        Ok(self.tables()?.tokens.get(value).cloned())
    }

    async fn get_tokens_by_email(&self, email: &str, token_type: TokenType) -> Result<Vec<Token>> {
        let extra = TokenExtraEmail::encode(email)
            .map_err(|e| StoreError::Corrupt(format!("token extra: {e}")))?;
        Ok(self
            .tables()?
            .tokens
            .values()
            .filter(|t| t.token_type == token_type && t.extra == extra)
            .cloned()
            .collect())
    }

    async fn delete_token(&self, value: &str) -> Result<()> {
        self.tables()?.tokens.remove(value);
        Ok(())
    }

    async fn delete_tokens_by_email(&self, email: &str, token_type: TokenType) -> Result<()> {
        let extra = TokenExtraEmail::encode(email)
            .map_err(|e| StoreError::Corrupt(format!("token extra: {e}")))?;
        self.tables()?
            .tokens
            .retain(|_, t| !(t.token_type == token_type && t.extra == extra));
        Ok(())
    }

    async fn sweep_tokens_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut t = self.tables()?;
        let before = t.tokens.len();
        t.tokens.retain(|_, token| token.create_at >= cutoff);
        Ok((before - t.tokens.len()) as u64)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn create_role(&self, role: &Role) -> Result<()> {
        let mut t = self.tables()?;
        if t.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::AlreadyExists("role name".into()));
        }
        t.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_role_by_name(&self, name: RoleName) -> Result<Option<Role>> {
        Ok(self
            .tables()?
            .roles
            .values()
            .find(|r| r.name == name.as_str())
            .cloned())
    }

    async fn has_role(&self, user_id: Uuid, name: RoleName) -> Result<bool> {
        let t = self.tables()?;
        Ok(Self::role_id(&t, name)
            .is_some_and(|role_id| t.user_roles.contains(&UserRole { user_id, role_id })))
    }

    async fn add_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut t = self.tables()?;
        if !t.user_roles.insert(UserRole { user_id, role_id }) {
            return Err(StoreError::AlreadyExists("user role".into()));
        }
        Ok(())
    }

    async fn remove_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        self.tables()?
            .user_roles
            .remove(&UserRole { user_id, role_id });
        Ok(())
    }
}

#[async_trait]
impl OAuthStateStore for MemoryStore {
    async fn create_oauth_state(&self, state: &OAuthState) -> Result<()> {
        self.tables()?.oauth_states.insert(state.id, state.clone());
        Ok(())
    }

    async fn get_oauth_state(&self, lookup: &Lookup) -> Result<Option<OAuthState>> {
        let t = self.tables()?;
        let found = match lookup {
            Lookup::ById(id) => t.oauth_states.get(id),
            Lookup::ByToken(token) => t.oauth_states.values().find(|s| &s.token == token),
        };
        Ok(found.cloned())
    }

    async fn delete_oauth_state(&self, id: Uuid) -> Result<()> {
        self.tables()?.oauth_states.remove(&id);
        Ok(())
    }

    async fn sweep_expired_oauth_states(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut t = self.tables()?;
        let before = t.oauth_states.len();
        t.oauth_states.retain(|_, s| s.expires_at >= now);
        Ok((before - t.oauth_states.len()) as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.tables().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::new_id;

    #[tokio::test]
    async fn failing_mode_surfaces_unavailable() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let err = store
            .get_session(&Lookup::ByToken("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.set_failing(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn session_lookup_by_id_and_token() {
        let store = MemoryStore::new();
        let session = Session::new(new_id());
        store.create_session(&session).await.unwrap();

        let by_id = store.get_session(&Lookup::ById(session.id)).await.unwrap();
        let by_token = store
            .get_session(&Lookup::ByToken(session.token.clone()))
            .await
            .unwrap();
        assert_eq!(by_id, Some(session.clone()));
        assert_eq!(by_token, Some(session.clone()));

        // An id is not a token and vice versa.
        let crossed = store
            .get_session(&Lookup::ByToken(session.id.to_string()))
            .await
            .unwrap();
        assert!(crossed.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = User {
            id: new_id(),
            create_at: now,
            update_at: now,
            email: "a@x.com".into(),
            email_verified: false,
            password: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
            state: UserState::Active,
            is_admin: false,
        };
        store.create_user(&user).await.unwrap();
        let dup = User {
            id: new_id(),
            ..user
        };
        assert!(matches!(
            store.create_user(&dup).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }
}
