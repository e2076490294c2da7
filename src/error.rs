//! Error types for the role synchronization system.
//!
//! This module provides the error hierarchy for every stage of a sync pass:
//! configuration, role cache persistence, role source materialization, and
//! the orchestrator's summary failures.

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncPhase;

/// Exit code for configuration and bootstrap failures.
pub const EXIT_CONFIG: u8 = 120;

/// Exit code for a failed full reset.
pub const EXIT_RESET: u8 = 130;

/// Exit code for failures during steady-state application.
pub const EXIT_APPLY: u8 = 200;

/// The main error type for the role synchronization system.
#[derive(Debug, Error)]
pub enum RoleSyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Role cache errors.
    #[error("Role cache error: {0}")]
    Cache(#[from] CacheError),

    /// Role source errors (git, local copy, directory removal).
    #[error("Role source error: {0}")]
    Source(#[from] SourceError),

    /// Sync pass failures.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A role uses a location type other than `git` or `local`.
    #[error("Role '{role}' has unsupported location type '{location_type}'")]
    UnsupportedLocationType {
        /// Role name.
        role: String,
        /// The rejected location type.
        location_type: String,
    },

    /// A git role uses a reference type other than `branch` or `tag`.
    #[error("Role '{role}' has unsupported ref type '{ref_type}'")]
    UnsupportedRefType {
        /// Role name.
        role: String,
        /// The rejected reference type.
        ref_type: String,
    },

    /// The home directory could not be determined.
    #[error("Cannot determine home directory")]
    NoHomeDir,
}

/// Role cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache file not found.
    #[error("Role cache file not found: {path}")]
    NotFound {
        /// Path to the missing cache file.
        path: PathBuf,
    },

    /// Cache file exists but cannot be read or parsed.
    #[error("Role cache is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Cache file could not be written.
    #[error("Failed to write role cache: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Serialization error.
    #[error("Role cache serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Role source materialization errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A git command exited unsuccessfully.
    #[error("git {operation} failed for role '{role}': {message}")]
    Git {
        /// Role name.
        role: String,
        /// Git subcommand that failed.
        operation: String,
        /// Captured stderr or description.
        message: String,
    },

    /// The requested branch or tag does not exist on the remote.
    #[error("Reference {reference} not found in {location}")]
    RefNotFound {
        /// Remote location.
        location: String,
        /// Fully qualified reference name.
        reference: String,
    },

    /// The git executable could not be started.
    #[error("Unable to run git: {message}")]
    GitUnavailable {
        /// Description of the spawn failure.
        message: String,
    },

    /// The role directory is not a git working tree.
    #[error("Role '{role}' is not a git working tree: {path}")]
    NotARepository {
        /// Role name.
        role: String,
        /// Role directory.
        path: PathBuf,
    },

    /// A local role source is missing or is not a directory.
    #[error("Local source for role '{role}' is not a readable directory: {path}")]
    LocalSourceMissing {
        /// Role name.
        role: String,
        /// Source path.
        path: PathBuf,
    },

    /// Copying a local role failed.
    #[error("Failed to copy role '{role}': {message}")]
    CopyFailed {
        /// Role name.
        role: String,
        /// Description of the copy failure.
        message: String,
    },

    /// Removing a role directory failed.
    #[error("Failed to remove {path}: {message}")]
    RemoveFailed {
        /// Directory that could not be removed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The spec handed to a primitive does not match its kind.
    #[error("Role '{role}' cannot be materialized: {message}")]
    InvalidSpec {
        /// Role name.
        role: String,
        /// Description of the mismatch.
        message: String,
    },
}

/// Sync pass failures.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A role action failed.
    #[error("Role '{role}' failed during {phase}: {reason}")]
    RoleFailed {
        /// Role name.
        role: String,
        /// Phase in which the failure happened.
        phase: SyncPhase,
        /// Underlying cause.
        reason: String,
    },

    /// Creating a role failed while no cache existed yet.
    #[error("Initial install of role '{role}' failed, partial role cache written: {reason}")]
    BootstrapFailed {
        /// Role name.
        role: String,
        /// Underlying cause.
        reason: String,
    },

    /// The pass failed outside of any single role.
    #[error("Sync failed during {phase}: {reason}")]
    PassFailed {
        /// Phase in which the failure happened.
        phase: SyncPhase,
        /// Underlying cause.
        reason: String,
    },

    /// The role directory was changed but the cache could not record it.
    #[error("Role '{role}' was materialized but the cache could not be updated, manual intervention needed: {reason}")]
    ManualInterventionRequired {
        /// Role name.
        role: String,
        /// Underlying cause.
        reason: String,
    },
}

/// Result type alias for role synchronization operations.
pub type Result<T> = std::result::Result<T, RoleSyncError>;

impl RoleSyncError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error was raised before anything was mutated.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Sync(SyncError::RoleFailed {
                    phase: SyncPhase::Validate,
                    ..
                } | SyncError::PassFailed {
                    phase: SyncPhase::Validate,
                    ..
                })
        )
    }

    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Sync(SyncError::BootstrapFailed { .. }) => EXIT_CONFIG,
            Self::Sync(SyncError::ManualInterventionRequired { .. }) => EXIT_APPLY,
            Self::Sync(SyncError::RoleFailed { phase, .. } | SyncError::PassFailed { phase, .. }) => {
                phase.exit_code()
            }
            _ => 1,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl CacheError {
    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Creates a git command error.
    #[must_use]
    pub fn git(
        role: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Git {
            role: role.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid spec error.
    #[must_use]
    pub fn invalid_spec(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            role: role.into(),
            message: message.into(),
        }
    }
}
