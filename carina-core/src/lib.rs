//! Carina Core
//!
//! Core library for an infrastructure management tool: the resource model,
//! the provider traits, and the building blocks providers share for listing,
//! filtering and verifying remote resources.

pub mod filter;
pub mod pagination;
pub mod projection;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod verify;
