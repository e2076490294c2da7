//! Configuration specification types for role synchronization.
//!
//! This module defines the structs that map to the `rolesync.yaml` file and
//! the [`RoleSpec`] type shared with the persisted role cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Default application directory name under the user's home.
pub const DEFAULT_APP_DIR: &str = ".local-kube";

/// Default roles directory name under the application directory.
pub const DEFAULT_ROLES_DIR: &str = "ansible-roles";

/// Default role cache file name inside the roles directory.
pub const DEFAULT_CACHE_FILE: &str = ".role-cache.json";

/// A named set of role specifications, ordered by role name.
pub type RoleSet = BTreeMap<String, RoleSpec>;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleSyncConfig {
    /// Directory layout.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Desired roles keyed by name.
    #[serde(default)]
    pub roles: RoleSet,
}

/// Directory layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    /// Application directory (defaults to `~/.local-kube`).
    #[serde(default)]
    pub app_dir: Option<String>,
    /// Roles directory name, relative to the application directory.
    #[serde(default = "default_roles_dir")]
    pub roles_dir: String,
    /// Cache file name inside the roles directory.
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

/// Where a role's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LocationType {
    /// A git repository cloned into the roles directory.
    Git,
    /// A local directory copied into the roles directory.
    Local,
    /// Any other value; rejected by validation.
    Unsupported(String),
}

/// Which kind of git reference a role tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RefType {
    /// A branch, resolved as `refs/heads/<ref>`.
    Branch,
    /// A tag, resolved as `refs/tags/<ref>`.
    Tag,
    /// Any other value; rejected by validation.
    Unsupported(String),
}

/// Specification of a single role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    /// Source kind.
    pub location_type: LocationType,
    /// Git URL or local path.
    pub location: String,
    /// Git reference kind (git roles only).
    #[serde(default, alias = "gitRefType", skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<RefType>,
    /// Git branch or tag name (git roles only).
    #[serde(
        default,
        rename = "ref",
        alias = "gitRef",
        skip_serializing_if = "Option::is_none"
    )]
    pub git_ref: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_dir: None,
            roles_dir: default_roles_dir(),
            cache_file: default_cache_file(),
        }
    }
}

impl PathsConfig {
    /// Resolves the application directory, expanding a leading `~`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is needed but unknown.
    pub fn resolve_app_dir(&self) -> Result<PathBuf> {
        match &self.app_dir {
            Some(dir) => expand_home(dir),
            None => dirs::home_dir()
                .map(|home| home.join(DEFAULT_APP_DIR))
                .ok_or_else(|| ConfigError::NoHomeDir.into()),
        }
    }

    /// Resolves the roles directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the application directory cannot be resolved.
    pub fn resolve_roles_dir(&self) -> Result<PathBuf> {
        Ok(self.resolve_app_dir()?.join(&self.roles_dir))
    }
}

impl RoleSpec {
    /// Creates a git role spec.
    #[must_use]
    pub fn git(location: impl Into<String>, ref_type: RefType, git_ref: impl Into<String>) -> Self {
        Self {
            location_type: LocationType::Git,
            location: location.into(),
            ref_type: Some(ref_type),
            git_ref: Some(git_ref.into()),
        }
    }

    /// Creates a git role spec tracking a branch.
    #[must_use]
    pub fn git_branch(location: impl Into<String>, branch: impl Into<String>) -> Self {
        Self::git(location, RefType::Branch, branch)
    }

    /// Creates a git role spec pinned to a tag.
    #[must_use]
    pub fn git_tag(location: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::git(location, RefType::Tag, tag)
    }

    /// Creates a local role spec.
    #[must_use]
    pub fn local(location: impl Into<String>) -> Self {
        Self {
            location_type: LocationType::Local,
            location: location.into(),
            ref_type: None,
            git_ref: None,
        }
    }

    /// Returns true for git-backed roles.
    #[must_use]
    pub const fn is_git(&self) -> bool {
        matches!(self.location_type, LocationType::Git)
    }

    /// Returns true for locally copied roles.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.location_type, LocationType::Local)
    }

    /// Returns the git reference, or an empty string when unset.
    #[must_use]
    pub fn reference(&self) -> &str {
        self.git_ref.as_deref().unwrap_or("")
    }

    /// Checks the location type only.
    ///
    /// # Errors
    ///
    /// Returns an error if the location type is neither `git` nor `local`.
    pub fn check_location_type(&self, role: &str) -> std::result::Result<(), ConfigError> {
        match &self.location_type {
            LocationType::Git | LocationType::Local => Ok(()),
            LocationType::Unsupported(other) => Err(ConfigError::UnsupportedLocationType {
                role: role.to_string(),
                location_type: other.clone(),
            }),
        }
    }

    /// Checks that the role spec is complete for its location type.
    ///
    /// Local specs ignore `refType` and `ref`. Git specs need a location, a
    /// supported reference type and a reference.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn check(&self, role: &str) -> std::result::Result<(), ConfigError> {
        self.check_location_type(role)?;

        if self.location.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("Role '{role}' has an empty location"),
                format!("roles.{role}.location"),
            ));
        }

        if self.is_local() {
            return Ok(());
        }

        match &self.ref_type {
            Some(RefType::Branch | RefType::Tag) => {}
            Some(RefType::Unsupported(other)) => {
                return Err(ConfigError::UnsupportedRefType {
                    role: role.to_string(),
                    ref_type: other.clone(),
                });
            }
            None => {
                return Err(ConfigError::validation(
                    format!("Git role '{role}' needs a refType (branch or tag)"),
                    format!("roles.{role}.refType"),
                ));
            }
        }

        if self.reference().trim().is_empty() {
            return Err(ConfigError::validation(
                format!("Git role '{role}' needs a ref"),
                format!("roles.{role}.ref"),
            ));
        }

        Ok(())
    }
}

impl RefType {
    /// Returns the fully qualified reference name for `name`.
    #[must_use]
    pub fn qualify(&self, name: &str) -> Option<String> {
        match self {
            Self::Branch => Some(format!("refs/heads/{name}")),
            Self::Tag => Some(format!("refs/tags/{name}")),
            Self::Unsupported(_) => None,
        }
    }

    /// Returns the fetch refspec that brings `name` into the local repository.
    #[must_use]
    pub fn refspec(&self, name: &str) -> Option<String> {
        match self {
            Self::Branch => Some(format!("+refs/heads/{name}:refs/remotes/origin/{name}")),
            Self::Tag => Some(format!("+refs/tags/{name}:refs/tags/{name}")),
            Self::Unsupported(_) => None,
        }
    }
}

impl From<String> for LocationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "git" => Self::Git,
            "local" => Self::Local,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<LocationType> for String {
    fn from(value: LocationType) -> Self {
        match value {
            LocationType::Git => Self::from("git"),
            LocationType::Local => Self::from("local"),
            LocationType::Unsupported(other) => other,
        }
    }
}

impl From<String> for RefType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "branch" => Self::Branch,
            "tag" => Self::Tag,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<RefType> for String {
    fn from(value: RefType) -> Self {
        match value {
            RefType::Branch => Self::from("branch"),
            RefType::Tag => Self::from("tag"),
            RefType::Unsupported(other) => other,
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Local => write!(f, "local"),
            Self::Unsupported(other) => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Tag => write!(f, "tag"),
            Self::Unsupported(other) => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for RoleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ref_type, &self.git_ref) {
            (Some(ref_type), Some(git_ref)) if self.is_git() => {
                write!(f, "{}({}@{ref_type}:{git_ref})", self.location_type, self.location)
            }
            _ => write!(f, "{}({})", self.location_type, self.location),
        }
    }
}

/// Expands a leading `~` to the user's home directory.
///
/// # Errors
///
/// Returns an error if the path starts with `~` and the home directory is unknown.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir().ok_or_else(|| ConfigError::NoHomeDir.into());
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        return Ok(home.join(rest));
    }
    Ok(Path::new(path).to_path_buf())
}

fn default_roles_dir() -> String {
    String::from(DEFAULT_ROLES_DIR)
}

fn default_cache_file() -> String {
    String::from(DEFAULT_CACHE_FILE)
}
