//! Service entry model - per-host credential records nested under an item.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ServiceEntry {
    pub service_id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub host: String,
    pub port: Option<i32>,
    pub login: String,
    pub secret: String,
    pub created_utc: DateTime<Utc>,
}

impl ServiceEntry {
    pub fn new(
        item_id: Uuid,
        name: String,
        host: String,
        port: Option<i32>,
        login: String,
        secret: String,
    ) -> Self {
        Self {
            service_id: Uuid::new_v4(),
            item_id,
            name,
            host,
            port,
            login,
            secret,
            created_utc: Utc::now(),
        }
    }
}

/// Full response, secret included: anyone allowed to read the entry is
/// allowed to read the credential it stores.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceEntryResponse {
    pub service_id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub host: String,
    pub port: Option<i32>,
    pub login: String,
    pub secret: String,
    pub created_utc: DateTime<Utc>,
}

impl From<ServiceEntry> for ServiceEntryResponse {
    fn from(s: ServiceEntry) -> Self {
        Self {
            service_id: s.service_id,
            item_id: s.item_id,
            name: s.name,
            host: s.host,
            port: s.port,
            login: s.login,
            secret: s.secret,
            created_utc: s.created_utc,
        }
    }
}
