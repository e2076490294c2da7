//! Role cache types.
//!
//! The cache records the last successfully applied spec of every role and is
//! the only record of what is currently materialized in the roles directory.

use serde::{Deserialize, Serialize};

use crate::config::{RoleSet, RoleSpec};

/// The persisted role cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCache {
    /// Last applied spec of every materialized role.
    #[serde(default)]
    pub roles: RoleSet,
}

impl RoleCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache from an existing role set.
    #[must_use]
    pub const fn from_roles(roles: RoleSet) -> Self {
        Self { roles }
    }

    /// Gets the cached spec of a role.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RoleSpec> {
        self.roles.get(name)
    }

    /// Records a role as materialized with the given spec.
    pub fn record(&mut self, name: &str, spec: RoleSpec) {
        self.roles.insert(name.to_string(), spec);
    }

    /// Forgets a role.
    pub fn forget(&mut self, name: &str) -> Option<RoleSpec> {
        self.roles.remove(name)
    }

    /// Returns true if no role is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Returns the number of cached roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns all cached role names in order.
    #[must_use]
    pub fn role_names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }
}
