//! service-core: shared infrastructure for vault services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
