//! Role membership checks and grants.

use tracing::info;
use uuid::Uuid;

use super::{AuthError, Result};
use crate::models::{Role, RoleName};
use crate::store::{RoleStore, Store, StoreError};

/// Whether `user_id` holds `role`. Always read through to the store.
pub async fn has_role(store: &dyn Store, user_id: Uuid, role: RoleName) -> Result<bool> {
    Ok(store.has_role(user_id, role).await?)
}

/// Grant `role` to `user_id`. Granting a held role is a no-op.
pub async fn grant(store: &dyn Store, user_id: Uuid, role: RoleName) -> Result<()> {
    let role_row = seeded_role(store, role).await?;
    match store.add_user_role(user_id, role_row.id).await {
        Ok(()) => {
            info!(%user_id, role = %role, "granted role");
            Ok(())
        }
        Err(StoreError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Revoke `role` from `user_id`. Revoking an absent role is a no-op.
pub async fn revoke(store: &dyn Store, user_id: Uuid, role: RoleName) -> Result<()> {
    let role_row = seeded_role(store, role).await?;
    store.remove_user_role(user_id, role_row.id).await?;
    info!(%user_id, role = %role, "revoked role");
    Ok(())
}

async fn seeded_role(store: &dyn Store, role: RoleName) -> Result<Role> {
    store
        .get_role_by_name(role)
        .await?
        .ok_or_else(|| AuthError::Internal(format!("role {role} has not been seeded")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, MemoryStore};

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store::initialize(&store).await.unwrap();
        store
    }

    #[tokio::test]
    async fn grant_then_check_then_revoke() {
        let store = seeded().await;
        let user_id = Uuid::now_v7();

        assert!(!has_role(&store, user_id, RoleName::Admin).await.unwrap());
        grant(&store, user_id, RoleName::Admin).await.unwrap();
        assert!(has_role(&store, user_id, RoleName::Admin).await.unwrap());
        assert!(!has_role(&store, user_id, RoleName::User).await.unwrap());

        revoke(&store, user_id, RoleName::Admin).await.unwrap();
        assert!(!has_role(&store, user_id, RoleName::Admin).await.unwrap());
    }

    #[tokio::test]
    async fn grant_is_idempotent() {
        let store = seeded().await;
        let user_id = Uuid::now_v7();
        grant(&store, user_id, RoleName::User).await.unwrap();
        grant(&store, user_id, RoleName::User).await.unwrap();
        assert!(has_role(&store, user_id, RoleName::User).await.unwrap());
    }

    #[tokio::test]
    async fn grant_without_seeding_is_internal_error() {
        let store = MemoryStore::new();
        let err = grant(&store, Uuid::now_v7(), RoleName::Admin).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
