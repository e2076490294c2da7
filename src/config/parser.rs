//! Configuration parser for loading role configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, Result, RoleSyncError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{expand_home, RoleSyncConfig};

/// Configuration parser for loading role configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<RoleSyncConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(RoleSyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RoleSyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<RoleSyncConfig> {
        debug!("Parsing YAML configuration");

        let config: RoleSyncConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            RoleSyncError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration with {} roles", config.roles.len());
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `ROLESYNC_APP_DIR`, `ROLESYNC_ROLES_DIR` and
    /// `ROLESYNC_CACHE_FILE`. Local role locations starting with `~` are
    /// expanded afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<RoleSyncConfig> {
        let mut config = self.load_file(path)?;

        Self::apply_env_overrides(&mut config);
        Self::expand_local_locations(&mut config)?;

        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut RoleSyncConfig) {
        if let Ok(app_dir) = std::env::var("ROLESYNC_APP_DIR") {
            debug!("Overriding paths.appDir from environment");
            config.paths.app_dir = Some(app_dir);
        }

        if let Ok(roles_dir) = std::env::var("ROLESYNC_ROLES_DIR") {
            debug!("Overriding paths.rolesDir from environment");
            config.paths.roles_dir = roles_dir;
        }

        if let Ok(cache_file) = std::env::var("ROLESYNC_CACHE_FILE") {
            debug!("Overriding paths.cacheFile from environment");
            config.paths.cache_file = cache_file;
        }
    }

    /// Expands `~` in the locations of local roles.
    fn expand_local_locations(config: &mut RoleSyncConfig) -> Result<()> {
        for (name, spec) in &mut config.roles {
            if spec.is_local() && spec.location.starts_with('~') {
                let expanded = expand_home(&spec.location)?;
                debug!("Expanded location of role {name} to {}", expanded.display());
                spec.location = expanded.display().to_string();
            }
        }
        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                RoleSyncError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["rolesync.yaml", "rolesync.yml", ".rolesync.yaml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(RoleSyncError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
