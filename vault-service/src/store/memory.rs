//! In-process store adapter.
//!
//! Enforces the same uniqueness constraints (by name) and atomicity rules
//! as the PostgreSQL adapter. Backs integration tests and local runs.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::{Group, Item, Provider, ServiceEntry, User};

use super::{ResourceKind, RevokeOutcome, Store, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    group_members: HashSet<(Uuid, Uuid)>,
    items: HashMap<Uuid, Item>,
    services: HashMap<Uuid, ServiceEntry>,
    item_principals: HashSet<(Uuid, Uuid)>,
    service_principals: HashSet<(Uuid, Uuid)>,
}

impl Inner {
    fn principals_mut(&mut self, kind: ResourceKind) -> &mut HashSet<(Uuid, Uuid)> {
        match kind {
            ResourceKind::Item => &mut self.item_principals,
            ResourceKind::Service => &mut self.service_principals,
        }
    }

    fn principals(&self, kind: ResourceKind) -> &HashSet<(Uuid, Uuid)> {
        match kind {
            ResourceKind::Item => &self.item_principals,
            ResourceKind::Service => &self.service_principals,
        }
    }

    fn principal_count(&self, kind: ResourceKind, resource_id: Uuid) -> usize {
        self.principals(kind)
            .iter()
            .filter(|(r, _)| *r == resource_id)
            .count()
    }

    fn check_user_constraints(&self, user: &User) -> Result<(), StoreError> {
        for existing in self.users.values() {
            if existing.user_id == user.user_id {
                continue;
            }
            if existing.username == user.username {
                return Err(StoreError::Conflict("users_username_key".to_string()));
            }
            if let (Some(a), Some(b)) = (&existing.email, &user.email) {
                if a.eq_ignore_ascii_case(b) {
                    return Err(StoreError::Conflict("users_email_key".to_string()));
                }
            }
            for provider in Provider::ALL {
                if let (Some(a), Some(b)) = (
                    existing.provider_subject(provider),
                    user.provider_subject(provider),
                ) {
                    if a == b {
                        return Err(StoreError::Conflict(
                            provider.subject_constraint().to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable(anyhow::anyhow!("store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable(anyhow::anyhow!("store lock poisoned")))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_provider_subject(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.provider_subject(provider) == Some(subject))
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.check_user_constraints(user)?;
        inner.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn set_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.write()?.users.get_mut(&user_id) {
            user.password_hash = Some(password_hash.to_string());
        }
        Ok(())
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<(), StoreError> {
        if let Some(user) = self.write()?.users.get_mut(&user_id) {
            user.is_active = active;
        }
        Ok(())
    }

    async fn create_group(&self, group: &Group, creator: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.groups.values().any(|g| g.name == group.name) {
            return Err(StoreError::Conflict("groups_name_key".to_string()));
        }
        inner.groups.insert(group.group_id, group.clone());
        inner.group_members.insert((group.group_id, creator));
        Ok(())
    }

    async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.write()?.group_members.insert((group_id, user_id));
        Ok(())
    }

    async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.read()?.group_members.contains(&(group_id, user_id)))
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, StoreError> {
        let inner = self.read()?;
        let mut groups: Vec<Group> = inner
            .groups
            .values()
            .filter(|g| inner.group_members.contains(&(g.group_id, user_id)))
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.created_utc);
        Ok(groups)
    }

    async fn create_item(&self, item: &Item, creator: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.items.insert(item.item_id, item.clone());
        inner.item_principals.insert((item.item_id, creator));
        Ok(())
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(&item_id).cloned())
    }

    async fn list_items_for_user(
        &self,
        user_id: Uuid,
        category: Option<&str>,
    ) -> Result<Vec<Item>, StoreError> {
        let inner = self.read()?;
        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|i| inner.item_principals.contains(&(i.item_id, user_id)))
            .filter(|i| category.is_none() || i.category.as_deref() == category)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.created_utc);
        Ok(items)
    }

    async fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.items.contains_key(&item.item_id) {
            inner.items.insert(item.item_id, item.clone());
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.items.remove(&item_id);
        inner.item_principals.retain(|(r, _)| *r != item_id);
        let orphaned: Vec<Uuid> = inner
            .services
            .values()
            .filter(|s| s.item_id == item_id)
            .map(|s| s.service_id)
            .collect();
        for service_id in orphaned {
            inner.services.remove(&service_id);
            inner.service_principals.retain(|(r, _)| *r != service_id);
        }
        Ok(())
    }

    async fn create_service(
        &self,
        service: &ServiceEntry,
        creator: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.services.insert(service.service_id, service.clone());
        inner
            .service_principals
            .insert((service.service_id, creator));
        Ok(())
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<ServiceEntry>, StoreError> {
        Ok(self.read()?.services.get(&service_id).cloned())
    }

    async fn list_services_for_item(
        &self,
        item_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ServiceEntry>, StoreError> {
        let inner = self.read()?;
        let mut services: Vec<ServiceEntry> = inner
            .services
            .values()
            .filter(|s| s.item_id == item_id)
            .filter(|s| inner.service_principals.contains(&(s.service_id, user_id)))
            .cloned()
            .collect();
        services.sort_by_key(|s| s.created_utc);
        Ok(services)
    }

    async fn update_service(&self, service: &ServiceEntry) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.services.contains_key(&service.service_id) {
            inner.services.insert(service.service_id, service.clone());
        }
        Ok(())
    }

    async fn delete_service(&self, service_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.services.remove(&service_id);
        inner.service_principals.retain(|(r, _)| *r != service_id);
        Ok(())
    }

    async fn is_principal_allowed(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .principals(kind)
            .contains(&(resource_id, user_id)))
    }

    async fn grant_principal(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        self.write()?
            .principals_mut(kind)
            .insert((resource_id, user_id));
        Ok(())
    }

    async fn revoke_principal(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<RevokeOutcome, StoreError> {
        let mut inner = self.write()?;
        if !inner.principals(kind).contains(&(resource_id, user_id)) {
            return Ok(RevokeOutcome::NotAPrincipal);
        }
        if inner.principal_count(kind, resource_id) <= 1 {
            return Ok(RevokeOutcome::LastPrincipal);
        }
        inner.principals_mut(kind).remove(&(resource_id, user_id));
        Ok(RevokeOutcome::Revoked)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}
