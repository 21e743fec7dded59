//! Item model - top-level shared entries in the vault.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A protected item. Who may touch it lives in the allowed-principals
/// relation, never on the record itself.
#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub item_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Item {
    pub fn new(
        name: String,
        description: String,
        category: Option<String>,
        tags: Option<String>,
    ) -> Self {
        Self {
            item_id: Uuid::new_v4(),
            name,
            description,
            category,
            tags,
            created_utc: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemResponse {
    pub item_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(i: Item) -> Self {
        Self {
            item_id: i.item_id,
            name: i.name,
            description: i.description,
            category: i.category,
            tags: i.tags,
            created_utc: i.created_utc,
        }
    }
}
