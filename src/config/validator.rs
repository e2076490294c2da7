//! Configuration validation for role specs.
//!
//! This module validates a whole configuration up front so that a bad role
//! definition is reported before any role directory is touched.

use crate::error::{ConfigError, Result, RoleSyncError};
use tracing::debug;

use super::spec::{LocationType, PathsConfig, RoleSet, RoleSyncConfig};

/// Validator for role configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The role the error belongs to, if any.
    pub role: Option<String>,
    /// The underlying error.
    pub error: ConfigError,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a full configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, config: &RoleSyncConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_paths(&config.paths, &mut result);
        Self::validate_roles(&config.roles, &mut result);

        result.into_result()
    }

    /// Validates a desired role set on its own.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate_roles_only(&self, roles: &RoleSet) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        Self::validate_roles(roles, &mut result);
        result.into_result()
    }

    /// Validates the directory layout.
    fn validate_paths(paths: &PathsConfig, result: &mut ValidationResult) {
        if !is_valid_entry_name(&paths.roles_dir) {
            result.push(
                "paths.rolesDir",
                None,
                ConfigError::validation(
                    format!("Roles directory '{}' must be a plain directory name", paths.roles_dir),
                    "paths.rolesDir",
                ),
            );
        }

        if !is_valid_entry_name(&paths.cache_file) {
            result.push(
                "paths.cacheFile",
                None,
                ConfigError::validation(
                    format!("Cache file '{}' must be a plain file name", paths.cache_file),
                    "paths.cacheFile",
                ),
            );
        }

        if paths.app_dir.as_ref().is_some_and(|dir| dir.trim().is_empty()) {
            result.push(
                "paths.appDir",
                None,
                ConfigError::validation("Application directory cannot be empty", "paths.appDir"),
            );
        }
    }

    /// Validates every role.
    fn validate_roles(roles: &RoleSet, result: &mut ValidationResult) {
        if roles.is_empty() {
            result.warnings.push(String::from("No roles defined in configuration"));
            return;
        }

        for (name, spec) in roles {
            let field = format!("roles.{name}");

            if !is_valid_role_name(name) {
                result.push(
                    &field,
                    Some(name.as_str()),
                    ConfigError::validation(
                        format!(
                            "Role name '{name}' is invalid. It must be a plain directory name not starting with '.'"
                        ),
                        &field,
                    ),
                );
                continue;
            }

            if let Err(error) = spec.check(name) {
                result.push(&field, Some(name.as_str()), error);
                continue;
            }

            if spec.location_type == LocationType::Local
                && (spec.ref_type.is_some() || spec.git_ref.is_some())
            {
                result
                    .warnings
                    .push(format!("Role '{name}' is local; refType and ref are ignored"));
            }
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: &str, role: Option<&str>, error: ConfigError) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            role: role.map(String::from),
            error,
        });
    }

    fn into_result(mut self) -> Result<Self> {
        if self.errors.is_empty() {
            debug!("Configuration validation passed");
            return Ok(self);
        }

        let first = self.errors.remove(0);
        Err(RoleSyncError::Config(first.error))
    }
}

/// Checks that a role name can safely be used as a directory name.
#[must_use]
pub fn is_valid_role_name(name: &str) -> bool {
    is_valid_entry_name(name) && !name.starts_with('.')
}

fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RefType, RoleSpec};

    fn config_with(roles: &[(&str, RoleSpec)]) -> RoleSyncConfig {
        RoleSyncConfig {
            paths: PathsConfig::default(),
            roles: roles
                .iter()
                .map(|(name, spec)| ((*name).to_string(), spec.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = config_with(&[
            ("kube", RoleSpec::git_branch("https://example.com/kube.git", "main")),
            ("common", RoleSpec::local("/srv/common")),
        ]);
        let result = ConfigValidator::new().validate(&config).expect("config is valid");
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_roles_warns() {
        let result = ConfigValidator::new()
            .validate(&RoleSyncConfig::default())
            .expect("empty config is valid");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_unsupported_location_type_rejected() {
        let mut bad = RoleSpec::local("ftp://x");
        bad.location_type = LocationType::Unsupported(String::from("ftp"));
        let config = config_with(&[
            ("good", RoleSpec::git_branch("https://example.com/x.git", "main")),
            ("bad", bad),
        ]);

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(matches!(
            err,
            RoleSyncError::Config(ConfigError::UnsupportedLocationType { .. })
        ));
    }

    #[test]
    fn test_unsupported_ref_type_rejected() {
        let config = config_with(&[(
            "kube",
            RoleSpec::git("https://example.com/x.git", RefType::Unsupported(String::from("sha")), "abc"),
        )]);
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_role_name_rules() {
        assert!(is_valid_role_name("kube"));
        assert!(is_valid_role_name("geerlingguy.docker"));
        assert!(!is_valid_role_name(""));
        assert!(!is_valid_role_name(".role-cache.json"));
        assert!(!is_valid_role_name(".."));
        assert!(!is_valid_role_name("a/b"));

        let config = config_with(&[("../escape", RoleSpec::local("/srv/x"))]);
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_local_with_ref_warns() {
        let mut spec = RoleSpec::local("/srv/common");
        spec.git_ref = Some(String::from("main"));
        let result = ConfigValidator::new()
            .validate(&config_with(&[("common", spec)]))
            .expect("config is valid");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_bad_roles_dir_rejected() {
        let mut config = RoleSyncConfig::default();
        config.paths.roles_dir = String::from("../elsewhere");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }
}
