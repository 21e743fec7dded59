use std::sync::Arc;

use uuid::Uuid;

use crate::models::User;
use crate::store::{ResourceKind, RevokeOutcome, Store};

use super::ServiceError;

/// Access control evaluator.
///
/// A pure membership test over the resource's allowed-principals relation.
/// Read, update, and delete all go through the same check; a principal with
/// any access has full access.
#[derive(Clone)]
pub struct AclService {
    store: Arc<dyn Store>,
}

impl AclService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn authorize(
        &self,
        user: &User,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> Result<(), ServiceError> {
        if self
            .store
            .is_principal_allowed(kind, resource_id, user.user_id)
            .await?
        {
            Ok(())
        } else {
            tracing::debug!(user_id = %user.user_id, resource_id = %resource_id, "Access denied");
            Err(ServiceError::Forbidden)
        }
    }

    pub async fn grant(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store
            .grant_principal(kind, resource_id, user_id)
            .await
            .map_err(Into::into)
    }

    pub async fn revoke(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        match self.store.revoke_principal(kind, resource_id, user_id).await? {
            RevokeOutcome::Revoked => Ok(()),
            RevokeOutcome::LastPrincipal => Err(ServiceError::LastPrincipal),
            RevokeOutcome::NotAPrincipal => Err(ServiceError::NotFound("Grant")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, User};
    use crate::store::MemoryStore;

    async fn setup() -> (AclService, Arc<MemoryStore>, User, User, Item) {
        let store = Arc::new(MemoryStore::new());
        let acl = AclService::new(store.clone());

        let alice = User::new_local("alice".to_string(), "$argon2id$stub".to_string(), None);
        let bob = User::new_local("bob".to_string(), "$argon2id$stub".to_string(), None);
        store.create_user(&alice).await.unwrap();
        store.create_user(&bob).await.unwrap();

        let item = Item::new("router".to_string(), String::new(), None, None);
        store.create_item(&item, alice.user_id).await.unwrap();

        (acl, store, alice, bob, item)
    }

    #[tokio::test]
    async fn test_authorize_is_a_pure_membership_test() {
        let (acl, _, alice, bob, item) = setup().await;

        assert!(acl
            .authorize(&alice, ResourceKind::Item, item.item_id)
            .await
            .is_ok());
        assert!(matches!(
            acl.authorize(&bob, ResourceKind::Item, item.item_id).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_grant_then_revoke_flips_authorization() {
        let (acl, _, _, bob, item) = setup().await;

        acl.grant(ResourceKind::Item, item.item_id, bob.user_id)
            .await
            .unwrap();
        assert!(acl
            .authorize(&bob, ResourceKind::Item, item.item_id)
            .await
            .is_ok());

        acl.revoke(ResourceKind::Item, item.item_id, bob.user_id)
            .await
            .unwrap();
        assert!(matches!(
            acl.authorize(&bob, ResourceKind::Item, item.item_id).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_last_principal_cannot_be_revoked() {
        let (acl, _, alice, _, item) = setup().await;

        assert!(matches!(
            acl.revoke(ResourceKind::Item, item.item_id, alice.user_id)
                .await,
            Err(ServiceError::LastPrincipal)
        ));
        // the refusal left the grant intact
        assert!(acl
            .authorize(&alice, ResourceKind::Item, item.item_id)
            .await
            .is_ok());
    }
}
