//! Role cache module.
//!
//! This module provides the durable record of which role specs are currently
//! materialized in the roles directory.

mod store;
mod local;
mod types;

pub use store::RoleCacheStore;
#[cfg(test)]
pub use store::MockRoleCacheStore;
pub use local::FileRoleCache;
pub use types::RoleCache;
