use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{ItemResponse, ServiceEntryResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Office router")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[schema(example = "network")]
    pub category: Option<String>,

    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListItemsQuery {
    /// Only items in this category
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemListResponse {
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceEntryResponse>,
}

/// Grant another user access to a resource.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GrantRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "bob")]
    pub username: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "ssh")]
    pub name: String,

    #[serde(default)]
    pub host: String,

    pub port: Option<i32>,

    #[serde(default)]
    pub login: String,

    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateServiceRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub login: Option<String>,
    pub secret: Option<String>,
}
