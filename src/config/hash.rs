//! Role set hashing for change detection.
//!
//! This module provides deterministic hashing of role sets so that the cached
//! set and the desired set can be compared at a glance.

use sha2::{Digest, Sha256};

use super::spec::{RoleSet, RoleSpec};

/// Hasher for computing role set fingerprints.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of a whole role set.
    ///
    /// Roles are visited in name order, so two sets with the same content
    /// always hash the same.
    #[must_use]
    pub fn hash_roles(&self, roles: &RoleSet) -> String {
        let mut hasher = Sha256::new();

        for (name, spec) in roles {
            hasher.update(name.as_bytes());
            hasher.update([0]);
            hasher.update(self.hash_role(spec).as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for a single role spec.
    #[must_use]
    pub fn hash_role(&self, spec: &RoleSpec) -> String {
        let mut hasher = Sha256::new();

        hasher.update(spec.location_type.to_string().as_bytes());
        hasher.update([0]);
        hasher.update(spec.location.as_bytes());
        hasher.update([0]);

        // Local roles ignore the ref fields
        if spec.is_git() {
            if let Some(ref_type) = &spec.ref_type {
                hasher.update(ref_type.to_string().as_bytes());
            }
            hasher.update([0]);
            hasher.update(spec.reference().as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Returns a short hash (first 8 characters) for display.
    #[must_use]
    pub fn short_hash(hash: &str) -> &str {
        &hash[..8.min(hash.len())]
    }
}
