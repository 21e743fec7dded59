pub mod acl;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod metrics;
pub mod oauth;

pub use acl::AclService;
pub use error::ServiceError;
pub use identity::IdentityService;
pub use jwt::{Claims, TokenService};
pub use oauth::{ExternalIdentityClaim, OAuthClient};
