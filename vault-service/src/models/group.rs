//! Group model - named collections of users for coarse sharing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub group_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            name,
            created_utc: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupResponse {
    pub group_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Group> for GroupResponse {
    fn from(g: Group) -> Self {
        Self {
            group_id: g.group_id,
            name: g.name,
            created_utc: g.created_utc,
        }
    }
}
