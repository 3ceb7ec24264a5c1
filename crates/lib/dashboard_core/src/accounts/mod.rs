//! Account service.
//!
//! [`UserService`] is the capability the HTTP layer depends on. It wraps the
//! store with the credential rules and session lifecycle. [`Accounts`]
//! composes it with tokens and mail into the user-facing flows.

mod flows;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthError, Result, credential, roles, sessions};
use crate::ids::new_id;
use crate::models::{RoleName, Session, User, UserState};
use crate::store::{Lookup, Store, UserStore};

pub use flows::{
    Accounts, AccountsConfig, DEFAULT_GITHUB_AUTHORIZE_URL, GithubOAuthConfig, ProfileUpdate, SignUp,
};

/// Input for creating an account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub role: Option<RoleName>,
}

/// User and session operations.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create an account. The email is lower-cased, both credentials are
    /// validated and the password is hashed before storage. The account is
    /// granted `role` (default `user`).
    async fn create(&self, new_user: NewUser) -> Result<User>;

    /// Fetch a user with `is_admin` filled from the role relation.
    async fn get(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist profile fields (email, names) and return the stored user.
    async fn update(&self, user: &User) -> Result<User>;

    /// Check an email/password pair. Every failure is the same
    /// [`AuthError::InvalidCredentials`]; the reason is only in the payload.
    async fn authenticate_for_login(&self, email: &str, password: &str) -> Result<User>;

    /// Start a new session for `user_id`.
    async fn login(&self, user_id: Uuid) -> Result<Session>;

    async fn logout(&self, session_id: Uuid) -> Result<()>;

    async fn get_session(&self, lookup: &Lookup) -> Result<Option<Session>>;

    async fn verify_email(&self, user_id: Uuid) -> Result<()>;

    async fn unverify_email(&self, user_id: Uuid) -> Result<()>;

    async fn has_admin_permission(&self, user_id: Uuid) -> Result<bool>;

    /// Replace the password hash and destroy every session of the user.
    async fn update_password(&self, user_id: Uuid, new_password: &str) -> Result<()>;

    async fn set_state(&self, user_id: Uuid, state: UserState) -> Result<()>;

    async fn grant_role(&self, user_id: Uuid, role: RoleName) -> Result<()>;

    async fn revoke_role(&self, user_id: Uuid, role: RoleName) -> Result<()>;
}

/// [`UserService`] over a [`Store`].
#[derive(Clone)]
pub struct StoreUserService {
    store: Arc<dyn Store>,
}

impl StoreUserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn with_admin_flag(&self, user: Option<User>) -> Result<Option<User>> {
        let Some(mut user) = user else {
            return Ok(None);
        };
        user.is_admin = roles::has_role(self.store.as_ref(), user.id, RoleName::Admin).await?;
        Ok(Some(user))
    }
}

#[async_trait]
impl UserService for StoreUserService {
    async fn create(&self, new_user: NewUser) -> Result<User> {
        let email = credential::normalize_email(&new_user.email);
        credential::validate_email(&email)?;
        credential::validate_password(&new_user.password)?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            create_at: now,
            update_at: now,
            email,
            email_verified: new_user.email_verified,
            password: credential::hash_password(&new_user.password)?,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            state: UserState::Active,
            is_admin: false,
        };
        user.validate().map_err(AuthError::Validation)?;

        self.store.create_user(&user).await?;
        roles::grant(self.store.as_ref(), user.id, RoleName::User).await?;
        let role = new_user.role.unwrap_or(RoleName::User);
        if role != RoleName::User {
            roles::grant(self.store.as_ref(), user.id, role).await?;
        }
        info!(user_id = %user.id, email = %user.email, role = %role, "created user");

        Ok(User {
            is_admin: role == RoleName::Admin,
            ..user
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let user = self.store.get_user(id).await?;
        self.with_admin_flag(user).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = credential::normalize_email(email);
        let user = self.store.get_user_by_email(&email).await?;
        self.with_admin_flag(user).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        user.validate().map_err(AuthError::Validation)?;
        self.store.update_user(user).await?;
        self.get(user.id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {} vanished during update", user.id)))
    }

    async fn authenticate_for_login(&self, email: &str, password: &str) -> Result<User> {
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials("blank password".into()));
        }
        let Some(user) = self.get_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials(format!("no user with email {email}")));
        };
        if !credential::compare_password(&user.password, password) {
            return Err(AuthError::InvalidCredentials(format!(
                "password mismatch for user {}",
                user.id
            )));
        }
        Ok(user)
    }

    async fn login(&self, user_id: Uuid) -> Result<Session> {
        let session = sessions::create(self.store.as_ref(), user_id).await?;
        info!(%user_id, session_id = %session.id, "user logged in");
        Ok(session)
    }

    async fn logout(&self, session_id: Uuid) -> Result<()> {
        sessions::destroy(self.store.as_ref(), session_id).await
    }

    async fn get_session(&self, lookup: &Lookup) -> Result<Option<Session>> {
        sessions::resolve(self.store.as_ref(), lookup).await
    }

    async fn verify_email(&self, user_id: Uuid) -> Result<()> {
        self.store.set_email_verified(user_id, true).await?;
        info!(%user_id, "email verified");
        Ok(())
    }

    async fn unverify_email(&self, user_id: Uuid) -> Result<()> {
        self.store.set_email_verified(user_id, false).await?;
        Ok(())
    }

    async fn has_admin_permission(&self, user_id: Uuid) -> Result<bool> {
        roles::has_role(self.store.as_ref(), user_id, RoleName::Admin).await
    }

    async fn update_password(&self, user_id: Uuid, new_password: &str) -> Result<()> {
        credential::validate_password(new_password)?;
        let hash = credential::hash_password(new_password)?;
        self.store.update_password_hash(user_id, &hash).await?;
        sessions::destroy_all_for_user(self.store.as_ref(), user_id).await?;
        info!(%user_id, "password updated, sessions invalidated");
        Ok(())
    }

    async fn set_state(&self, user_id: Uuid, state: UserState) -> Result<()> {
        self.store.set_user_state(user_id, state).await?;
        info!(%user_id, state = %state, "user state changed");
        Ok(())
    }

    async fn grant_role(&self, user_id: Uuid, role: RoleName) -> Result<()> {
        roles::grant(self.store.as_ref(), user_id, role).await
    }

    async fn revoke_role(&self, user_id: Uuid, role: RoleName) -> Result<()> {
        roles::revoke(self.store.as_ref(), user_id, role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, MemoryStore};

    async fn service() -> (Arc<MemoryStore>, StoreUserService) {
        let store = Arc::new(MemoryStore::new());
        store::initialize(store.as_ref()).await.unwrap();
        (store.clone(), StoreUserService::new(store))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password: "Password12".into(),
            ..NewUser::default()
        }
    }

    #[tokio::test]
    async fn create_lowercases_and_hashes() {
        let (_, users) = service().await;
        let user = users.create(new_user("Mixed@Case.com")).await.unwrap();
        assert_eq!(user.email, "mixed@case.com");
        assert_ne!(user.password, "Password12");
        assert!(!user.email_verified);
        assert!(!user.is_admin);
        assert!(users.get_by_email("MIXED@case.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_rejects_duplicates_as_conflict() {
        let (_, users) = service().await;
        users.create(new_user("a@b.com")).await.unwrap();
        let err = users.create(new_user("A@B.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_rejects_weak_password() {
        let (_, users) = service().await;
        let mut input = new_user("a@b.com");
        input.password = "weak".into();
        assert!(matches!(
            users.create(input).await,
            Err(AuthError::InvalidPassword(_))
        ));
    }

    #[tokio::test]
    async fn admin_flag_follows_role() {
        let (_, users) = service().await;
        let user = users.create(new_user("a@b.com")).await.unwrap();
        assert!(!users.has_admin_permission(user.id).await.unwrap());

        users.grant_role(user.id, RoleName::Admin).await.unwrap();
        assert!(users.get(user.id).await.unwrap().unwrap().is_admin);

        users.revoke_role(user.id, RoleName::Admin).await.unwrap();
        assert!(!users.get(user.id).await.unwrap().unwrap().is_admin);
    }

    #[tokio::test]
    async fn authenticate_failures_are_indistinguishable() {
        let (_, users) = service().await;
        users.create(new_user("a@b.com")).await.unwrap();

        let unknown = users
            .authenticate_for_login("nobody@b.com", "Password12")
            .await
            .unwrap_err();
        let wrong = users
            .authenticate_for_login("a@b.com", "Password13")
            .await
            .unwrap_err();
        let blank = users.authenticate_for_login("a@b.com", "").await.unwrap_err();
        for err in [unknown, wrong, blank] {
            assert!(matches!(err, AuthError::InvalidCredentials(_)));
            assert_eq!(err.to_string(), "invalid credentials");
        }
        assert!(users.authenticate_for_login("A@b.com", "Password12").await.is_ok());
    }

    #[tokio::test]
    async fn update_password_invalidates_every_session() {
        let (store, users) = service().await;
        let user = users.create(new_user("a@b.com")).await.unwrap();
        users.login(user.id).await.unwrap();
        users.login(user.id).await.unwrap();

        users.update_password(user.id, "NewPassword34").await.unwrap();
        assert_eq!(store.session_count_for_user(user.id), 0);
        assert!(users.authenticate_for_login("a@b.com", "NewPassword34").await.is_ok());
    }

    #[tokio::test]
    async fn update_password_surfaces_store_failure() {
        let (store, users) = service().await;
        let user = users.create(new_user("a@b.com")).await.unwrap();
        store.set_failing(true);
        assert!(matches!(
            users.update_password(user.id, "NewPassword34").await,
            Err(AuthError::Store(_))
        ));
    }
}
