//! PostgreSQL store.
//!
//! Every query runs under a bounded timeout. A timed-out call is a
//! [`StoreError::Timeout`], never an absent row, so callers fail closed.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    Lookup, OAuthStateStore, Result, RoleStore, SessionStore, Store, StoreError, TokenStore,
    UserStore,
};
use crate::models::{
    OAuthState, Role, RoleName, Session, Token, TokenExtraEmail, TokenType, User, UserState,
};

/// Default per-query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// PostgreSQL-backed [`Store`]. Cheap to clone; the pool is shared.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations from `dashboard_core/migrations/`.
    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    create_at: DateTime<Utc>,
    update_at: DateTime<Utc>,
    email: String,
    email_verified: bool,
    password: String,
    first_name: String,
    last_name: String,
    state: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            create_at: row.create_at,
            update_at: row.update_at,
            email: row.email,
            email_verified: row.email_verified,
            password: row.password,
            first_name: row.first_name,
            last_name: row.last_name,
            state: row.state.parse().map_err(StoreError::Corrupt)?,
            is_admin: false,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    token: String,
    user_id: Uuid,
    csrf_token: String,
    create_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    api_key: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            token: row.token,
            user_id: row.user_id,
            csrf_token: row.csrf_token,
            create_at: row.create_at,
            expires_at: row.expires_at,
            api_key: row.api_key,
        }
    }
}

#[derive(FromRow)]
struct TokenRow {
    token: String,
    create_at: DateTime<Utc>,
    token_type: String,
    extra: String,
}

impl TryFrom<TokenRow> for Token {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self> {
        Ok(Token {
            token: row.token,
            create_at: row.create_at,
            token_type: row.token_type.parse().map_err(StoreError::Corrupt)?,
            extra: row.extra,
        })
    }
}

#[derive(FromRow)]
struct OAuthStateRow {
    id: Uuid,
    token: String,
    create_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<OAuthStateRow> for OAuthState {
    fn from(row: OAuthStateRow) -> Self {
        OAuthState {
            id: row.id,
            token: row.token,
            create_at: row.create_at,
            expires_at: row.expires_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, create_at, update_at, email, email_verified, password, first_name, last_name, state";
const SESSION_COLUMNS: &str = "id, token, user_id, csrf_token, create_at, expires_at, api_key";
const TOKEN_COLUMNS: &str = "token, create_at, token_type, extra";
const OAUTH_STATE_COLUMNS: &str = "id, token, create_at, expires_at";

fn encode_extra(email: &str) -> Result<String> {
    TokenExtraEmail::encode(email).map_err(|e| StoreError::Corrupt(format!("token extra: {e}")))
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        self.timed(
            sqlx::query(
                "INSERT INTO users \
                 (id, create_at, update_at, email, email_verified, password, first_name, last_name, state) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(user.id)
            .bind(user.create_at)
            .bind(user.update_at)
            .bind(&user.email)
            .bind(user.email_verified)
            .bind(&user.password)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.state.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(email)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        self.timed(
            sqlx::query(
                "UPDATE users SET email = $2, first_name = $3, last_name = $4, update_at = now() \
                 WHERE id = $1",
            )
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        self.timed(
            sqlx::query("UPDATE users SET password = $2, update_at = now() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<()> {
        self.timed(
            sqlx::query("UPDATE users SET email_verified = $2, update_at = now() WHERE id = $1")
                .bind(id)
                .bind(verified)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn set_user_state(&self, id: Uuid, state: UserState) -> Result<()> {
        self.timed(
            sqlx::query("UPDATE users SET state = $2, update_at = now() WHERE id = $1")
                .bind(id)
                .bind(state.as_str())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn count_users(&self) -> Result<i64> {
        self.timed(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&self.pool))
            .await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        self.timed(
            sqlx::query(
                "INSERT INTO sessions \
                 (id, token, user_id, csrf_token, create_at, expires_at, api_key) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(session.id)
            .bind(&session.token)
            .bind(session.user_id)
            .bind(&session.csrf_token)
            .bind(session.create_at)
            .bind(session.expires_at)
            .bind(session.api_key)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_session(&self, lookup: &Lookup) -> Result<Option<Session>> {
        let row = match lookup {
            Lookup::ById(id) => {
                let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1");
                self.timed(
                    sqlx::query_as::<_, SessionRow>(&sql)
                        .bind(*id)
                        .fetch_optional(&self.pool),
                )
                .await?
            }
            Lookup::ByToken(token) => {
                let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token = $1");
                self.timed(
                    sqlx::query_as::<_, SessionRow>(&sql)
                        .bind(token)
                        .fetch_optional(&self.pool),
                )
                .await?
            }
        };
        Ok(row.map(Session::from))
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        self.timed(
            sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<()> {
        self.timed(
            sqlx::query("DELETE FROM sessions WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let done = self
            .timed(
                sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
                    .bind(now)
                    .execute(&self.pool),
            )
            .await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn create_token(&self, token: &Token) -> Result<()> {
        self.timed(
            sqlx::query(
                "INSERT INTO tokens (token, create_at, token_type, extra) VALUES ($1, $2, $3, $4)",
            )
            .bind(&token.token)
            .bind(token.create_at)
            .bind(token.token_type.as_str())
            .bind(&token.extra)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = $1");
        let row = self
            .timed(
                sqlx::query_as::<_, TokenRow>(&sql)
                    .bind(value)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Token::try_from).transpose()
    }

    async fn get_tokens_by_email(&self, email: &str, token_type: TokenType) -> Result<Vec<Token>> {
        let extra = encode_extra(email)?;
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE extra = $1 AND token_type = $2");
        let rows = self
            .timed(
                sqlx::query_as::<_, TokenRow>(&sql)
                    .bind(extra)
                    .bind(token_type.as_str())
                    .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(Token::try_from).collect()
    }

    async fn delete_token(&self, value: &str) -> Result<()> {
        self.timed(
            sqlx::query("DELETE FROM tokens WHERE token = $1")
                .bind(value)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete_tokens_by_email(&self, email: &str, token_type: TokenType) -> Result<()> {
        let extra = encode_extra(email)?;
        self.timed(
            sqlx::query("DELETE FROM tokens WHERE extra = $1 AND token_type = $2")
                .bind(extra)
                .bind(token_type.as_str())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn sweep_tokens_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let done = self
            .timed(
                sqlx::query("DELETE FROM tokens WHERE create_at < $1")
                    .bind(cutoff)
                    .execute(&self.pool),
            )
            .await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn create_role(&self, role: &Role) -> Result<()> {
        self.timed(
            sqlx::query("INSERT INTO roles (id, name, create_at, update_at) VALUES ($1, $2, $3, $4)")
                .bind(role.id)
                .bind(&role.name)
                .bind(role.create_at)
                .bind(role.update_at)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_role_by_name(&self, name: RoleName) -> Result<Option<Role>> {
        let row = self
            .timed(
                sqlx::query_as::<_, (Uuid, String, DateTime<Utc>, DateTime<Utc>)>(
                    "SELECT id, name, create_at, update_at FROM roles WHERE name = $1",
                )
                .bind(name.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(|(id, name, create_at, update_at)| Role {
            id,
            name,
            create_at,
            update_at,
        }))
    }

    async fn has_role(&self, user_id: Uuid, name: RoleName) -> Result<bool> {
        self.timed(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(\
                   SELECT 1 FROM user_roles ur JOIN roles r ON ur.role_id = r.id \
                   WHERE ur.user_id = $1 AND r.name = $2)",
            )
            .bind(user_id)
            .bind(name.as_str())
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn add_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        self.timed(
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn remove_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        self.timed(
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
                .bind(user_id)
                .bind(role_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OAuthStateStore for PgStore {
    async fn create_oauth_state(&self, state: &OAuthState) -> Result<()> {
        self.timed(
            sqlx::query(
                "INSERT INTO oauth_states (id, token, create_at, expires_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(state.id)
            .bind(&state.token)
            .bind(state.create_at)
            .bind(state.expires_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn get_oauth_state(&self, lookup: &Lookup) -> Result<Option<OAuthState>> {
        let row = match lookup {
            Lookup::ById(id) => {
                let sql = format!("SELECT {OAUTH_STATE_COLUMNS} FROM oauth_states WHERE id = $1");
                self.timed(
                    sqlx::query_as::<_, OAuthStateRow>(&sql)
                        .bind(*id)
                        .fetch_optional(&self.pool),
                )
                .await?
            }
            Lookup::ByToken(token) => {
                let sql =
                    format!("SELECT {OAUTH_STATE_COLUMNS} FROM oauth_states WHERE token = $1");
                self.timed(
                    sqlx::query_as::<_, OAuthStateRow>(&sql)
                        .bind(token)
                        .fetch_optional(&self.pool),
                )
                .await?
            }
        };
        Ok(row.map(OAuthState::from))
    }

    async fn delete_oauth_state(&self, id: Uuid) -> Result<()> {
        self.timed(
            sqlx::query("DELETE FROM oauth_states WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn sweep_expired_oauth_states(&self, now: DateTime<Utc>) -> Result<u64> {
        let done = self
            .timed(
                sqlx::query("DELETE FROM oauth_states WHERE expires_at < $1")
                    .bind(now)
                    .execute(&self.pool),
            )
            .await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        self.timed(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }
}
