//! OAuth connect state: a short-lived anti-forgery value carried through
//! the provider redirect.

use tracing::warn;
use uuid::Uuid;

use super::Result;
use crate::models::OAuthState;
use crate::store::{Lookup, OAuthStateStore, Store};

/// Create and persist a new state value.
pub async fn create_state(store: &dyn Store) -> Result<OAuthState> {
    let state = OAuthState::new();
    store.create_oauth_state(&state).await?;
    Ok(state)
}

/// Resolve a state by id or token. Expired rows resolve to `None` and are
/// deleted.
pub async fn resolve_state(store: &dyn Store, lookup: &Lookup) -> Result<Option<OAuthState>> {
    let Some(state) = store.get_oauth_state(lookup).await? else {
        return Ok(None);
    };
    if state.is_expired_at(chrono::Utc::now()) {
        if let Err(e) = store.delete_oauth_state(state.id).await {
            warn!(state_id = %state.id, error = %e, "failed to delete expired oauth state");
        }
        return Ok(None);
    }
    Ok(Some(state))
}

pub async fn destroy_state(store: &dyn Store, id: Uuid) -> Result<()> {
    store.delete_oauth_state(id).await?;
    Ok(())
}

/// Resolve the state named by `token` and delete it so it cannot be reused.
/// Returns `false` when the state is unknown or expired.
pub async fn take_state(store: &dyn Store, token: &str) -> Result<bool> {
    match resolve_state(store, &Lookup::ByToken(token.to_string())).await? {
        Some(state) => {
            destroy_state(store, state.id).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
