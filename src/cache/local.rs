//! File-based role cache backend.
//!
//! The cache lives inside the roles directory as a pretty-printed JSON file.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{PathsConfig, DEFAULT_CACHE_FILE};
use crate::error::{CacheError, Result, RoleSyncError};

use super::store::RoleCacheStore;
use super::types::RoleCache;

/// File-based role cache.
#[derive(Debug, Clone)]
pub struct FileRoleCache {
    /// Roles directory holding the cache file.
    roles_dir: PathBuf,
    /// Path to the cache file.
    cache_path: PathBuf,
}

impl FileRoleCache {
    /// Creates a cache with the default file name inside `roles_dir`.
    #[must_use]
    pub fn new(roles_dir: impl Into<PathBuf>) -> Self {
        Self::with_file_name(roles_dir, DEFAULT_CACHE_FILE)
    }

    /// Creates a cache with a custom file name inside `roles_dir`.
    #[must_use]
    pub fn with_file_name(roles_dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let roles_dir = roles_dir.into();
        let cache_path = roles_dir.join(file_name);

        Self {
            roles_dir,
            cache_path,
        }
    }

    /// Creates a cache from the configured directory layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the roles directory cannot be resolved.
    pub fn from_paths(paths: &PathsConfig) -> Result<Self> {
        Ok(Self::with_file_name(
            paths.resolve_roles_dir()?,
            &paths.cache_file,
        ))
    }

    /// Returns the path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Ensures the roles directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.roles_dir.exists() {
            debug!("Creating roles directory: {}", self.roles_dir.display());
            fs::create_dir_all(&self.roles_dir).await.map_err(|e| {
                RoleSyncError::Cache(CacheError::write_failed(format!(
                    "Failed to create roles directory {}: {e}",
                    self.roles_dir.display()
                )))
            })?;
        }
        Ok(())
    }

    /// Serializes the cache with stable two-space indentation.
    fn render(cache: &RoleCache) -> Result<String> {
        let mut content = serde_json::to_string_pretty(cache).map_err(|e| {
            RoleSyncError::Cache(CacheError::SerializationError {
                message: format!("Failed to serialize role cache: {e}"),
            })
        })?;
        content.push('\n');
        Ok(content)
    }
}

#[async_trait]
impl RoleCacheStore for FileRoleCache {
    async fn exists(&self) -> Result<bool> {
        match fs::metadata(&self.cache_path).await {
            Ok(_) => {
                debug!("Role cache file exists: {}", self.cache_path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Role cache file does not exist: {}", self.cache_path.display());
                Ok(false)
            }
            Err(e) => Err(RoleSyncError::Cache(CacheError::corrupted(format!(
                "Failed to check role cache file {}: {e}",
                self.cache_path.display()
            )))),
        }
    }

    async fn read(&self) -> Result<RoleCache> {
        debug!("Reading role cache from: {}", self.cache_path.display());

        let content = fs::read_to_string(&self.cache_path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RoleSyncError::Cache(CacheError::NotFound {
                    path: self.cache_path.clone(),
                })
            } else {
                RoleSyncError::Cache(CacheError::corrupted(format!(
                    "Failed to read role cache file: {e}"
                )))
            }
        })?;

        let cache: RoleCache = serde_json::from_str(&content).map_err(|e| {
            RoleSyncError::Cache(CacheError::corrupted(format!(
                "Failed to parse role cache file: {e}"
            )))
        })?;

        debug!("Loaded role cache with {} roles", cache.len());
        Ok(cache)
    }

    async fn write(&self, cache: &RoleCache) -> Result<()> {
        self.ensure_dir().await?;

        debug!("Writing role cache to: {}", self.cache_path.display());
        let content = Self::render(cache)?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.cache_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            RoleSyncError::Cache(CacheError::write_failed(format!(
                "Failed to create temp cache file: {e}"
            )))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            RoleSyncError::Cache(CacheError::write_failed(format!(
                "Failed to write cache file: {e}"
            )))
        })?;

        file.sync_all().await.map_err(|e| {
            RoleSyncError::Cache(CacheError::write_failed(format!(
                "Failed to sync cache file: {e}"
            )))
        })?;

        fs::rename(&temp_path, &self.cache_path).await.map_err(|e| {
            RoleSyncError::Cache(CacheError::write_failed(format!(
                "Failed to rename cache file: {e}"
            )))
        })?;

        debug!("Role cache written with {} roles", cache.len());
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        info!("Deleting role cache file: {}", self.cache_path.display());
        fs::remove_file(&self.cache_path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RoleSyncError::Cache(CacheError::NotFound {
                    path: self.cache_path.clone(),
                })
            } else {
                RoleSyncError::Cache(CacheError::write_failed(format!(
                    "Failed to delete role cache file: {e}"
                )))
            }
        })
    }
}
