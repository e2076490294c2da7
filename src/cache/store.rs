//! Role cache store trait definition.
//!
//! This module defines the common interface for role cache backends.

use async_trait::async_trait;

use crate::error::Result;
use super::types::RoleCache;

/// Trait for role cache backends.
///
/// There is no locking: a single writer per roles directory is assumed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleCacheStore: Send + Sync {
    /// Checks if the cache exists.
    async fn exists(&self) -> Result<bool>;

    /// Reads the cache.
    ///
    /// A missing or malformed cache is an error, never an empty cache.
    async fn read(&self) -> Result<RoleCache>;

    /// Writes the cache, replacing any previous content.
    async fn write(&self, cache: &RoleCache) -> Result<()>;

    /// Deletes the cache. Fails if there is nothing to delete.
    async fn delete(&self) -> Result<()>;
}

