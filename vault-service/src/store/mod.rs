//! Persistent store collaborator.
//!
//! The core never calls persistence methods on the data records; every
//! operation goes through this trait. Single calls are atomic, and the
//! create-resource operations grant the creator inside the same
//! transaction so no resource ever exists without a principal.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Group, Item, Provider, ServiceEntry, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the constraint name
    /// so callers can tell a username race from a provider-subject race.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl StoreError {
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, StoreError::Conflict(c) if c == constraint)
    }
}

/// Which principals relation a grant/revoke/membership call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Item,
    Service,
}

impl ResourceKind {
    fn principals_table(&self) -> &'static str {
        match self {
            ResourceKind::Item => "item_principals",
            ResourceKind::Service => "service_principals",
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            ResourceKind::Item => "item_id",
            ResourceKind::Service => "service_id",
        }
    }
}

/// Outcome of a revoke attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    /// Refused: the grant is the resource's last one and removing it would
    /// orphan the resource.
    LastPrincipal,
    NotAPrincipal,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn get_user_by_provider_subject(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    async fn set_user_password(&self, user_id: Uuid, password_hash: &str)
        -> Result<(), StoreError>;
    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<(), StoreError>;

    // Groups
    async fn create_group(&self, group: &Group, creator: Uuid) -> Result<(), StoreError>;
    async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
    async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    async fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, StoreError>;

    // Items
    async fn create_item(&self, item: &Item, creator: Uuid) -> Result<(), StoreError>;
    async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>, StoreError>;
    async fn list_items_for_user(
        &self,
        user_id: Uuid,
        category: Option<&str>,
    ) -> Result<Vec<Item>, StoreError>;
    async fn update_item(&self, item: &Item) -> Result<(), StoreError>;
    async fn delete_item(&self, item_id: Uuid) -> Result<(), StoreError>;

    // Service entries
    async fn create_service(&self, service: &ServiceEntry, creator: Uuid)
        -> Result<(), StoreError>;
    async fn get_service(&self, service_id: Uuid) -> Result<Option<ServiceEntry>, StoreError>;
    async fn list_services_for_item(
        &self,
        item_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ServiceEntry>, StoreError>;
    async fn update_service(&self, service: &ServiceEntry) -> Result<(), StoreError>;
    async fn delete_service(&self, service_id: Uuid) -> Result<(), StoreError>;

    // Allowed-principals relation
    async fn is_principal_allowed(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError>;
    async fn grant_principal(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), StoreError>;
    async fn revoke_principal(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<RevokeOutcome, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
