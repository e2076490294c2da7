//! Configuration module for role synchronization.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `rolesync.yaml`
//! - Validation of role specifications
//! - Computing role set hashes for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    expand_home, LocationType, PathsConfig, RefType, RoleSet, RoleSpec, RoleSyncConfig,
    DEFAULT_APP_DIR, DEFAULT_CACHE_FILE, DEFAULT_ROLES_DIR,
};
pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use validator::{is_valid_role_name, ConfigValidator, ValidationError, ValidationResult};
pub use hash::ConfigHasher;
