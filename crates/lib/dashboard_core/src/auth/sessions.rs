//! Session lifecycle: create, resolve with lazy expiry, destroy.

use tracing::{debug, warn};
use uuid::Uuid;

use super::Result;
use crate::models::Session;
use crate::store::{Lookup, SessionStore, Store};

/// Create and persist a fresh session for `user_id`.
pub async fn create(store: &dyn Store, user_id: Uuid) -> Result<Session> {
    let session = Session::new(user_id);
    store.create_session(&session).await?;
    debug!(session_id = %session.id, %user_id, "session created");
    Ok(session)
}

/// Resolve a session by id or bearer token.
///
/// An expired session resolves to `None` and its row is deleted; a failed
/// delete is logged and does not change the outcome.
pub async fn resolve(store: &dyn Store, lookup: &Lookup) -> Result<Option<Session>> {
    let Some(session) = store.get_session(lookup).await? else {
        return Ok(None);
    };
    if session.is_expired() {
        if let Err(e) = store.delete_session(session.id).await {
            warn!(session_id = %session.id, error = %e, "failed to delete expired session");
        }
        return Ok(None);
    }
    Ok(Some(session))
}

/// Destroy one session. Deleting an absent session succeeds.
pub async fn destroy(store: &dyn Store, id: Uuid) -> Result<()> {
    store.delete_session(id).await?;
    debug!(session_id = %id, "session destroyed");
    Ok(())
}

/// Destroy every session belonging to `user_id`.
pub async fn destroy_all_for_user(store: &dyn Store, user_id: Uuid) -> Result<()> {
    store.delete_sessions_for_user(user_id).await?;
    debug!(%user_id, "all sessions destroyed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::AuthError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn resolves_by_id_and_token() {
        let store = MemoryStore::new();
        let user_id = Uuid::now_v7();
        let session = create(&store, user_id).await.unwrap();

        let by_id = resolve(&store, &Lookup::ById(session.id)).await.unwrap().unwrap();
        let by_token = resolve(&store, &Lookup::ByToken(session.token.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.id, session.id);
        assert_eq!(by_token.user_id, user_id);
    }

    #[tokio::test]
    async fn expired_session_resolves_to_none_and_is_deleted() {
        let store = MemoryStore::new();
        let mut session = Session::new(Uuid::now_v7());
        session.expires_at = Utc::now() - Duration::seconds(1);
        store.create_session(&session).await.unwrap();

        let found = resolve(&store, &Lookup::ByToken(session.token.clone())).await.unwrap();
        assert!(found.is_none());
        assert!(!store.contains_session(session.id));
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let store = MemoryStore::new();
        let session = create(&store, Uuid::now_v7()).await.unwrap();
        destroy(&store, session.id).await.unwrap();
        destroy(&store, session.id).await.unwrap();
        assert!(!store.contains_session(session.id));
    }

    #[tokio::test]
    async fn destroy_all_leaves_other_users_alone() {
        let store = MemoryStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        create(&store, alice).await.unwrap();
        create(&store, alice).await.unwrap();
        create(&store, bob).await.unwrap();

        destroy_all_for_user(&store, alice).await.unwrap();
        assert_eq!(store.session_count_for_user(alice), 0);
        assert_eq!(store.session_count_for_user(bob), 1);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let err = resolve(&store, &Lookup::ByToken("x".into())).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }
}
