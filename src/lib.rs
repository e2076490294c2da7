// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_in_result)]
#![warn(clippy::redundant_clone)]
#![allow(clippy::module_name_repetitions)]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # rolesync
//!
//! Cache-backed synchronization of provisioning roles.
//!
//! ## Overview
//!
//! A role is a named directory of provisioning content, sourced either from a
//! git repository at a branch or tag, or from a local directory. rolesync keeps
//! a roles directory in line with a declared set of roles:
//!
//! - The first run installs every declared role and writes a role cache
//! - Later runs reconcile the cache against the declaration and only touch
//!   roles that were added, removed or changed
//! - The cache is rewritten after every role, so an interrupted run resumes
//!   from the last completed role
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, validation and hashing
//! - [`cache`]: The persisted role cache
//! - [`source`]: Materializing roles from git and local directories
//! - [`planner`]: Reconciliation, plans and per-role execution
//! - [`sync`]: The synchronization pass and its report
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! roles:
//!   kube:
//!     locationType: git
//!     location: https://github.com/dgutierrez1287/ansible-role-kube
//!     refType: branch
//!     ref: master
//!   site-common:
//!     locationType: local
//!     location: ~/work/roles/site-common
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod source;
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use cache::{FileRoleCache, RoleCache, RoleCacheStore};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, RoleSet, RoleSpec, RoleSyncConfig};
pub use error::{Result, RoleSyncError};
pub use planner::{reconcile, PlanExecutor, RoleActionSet, RolePlan};
pub use source::{GitCli, RoleMaterializer, RoleSourceMaterializer};
pub use sync::{SyncOrchestrator, SyncReport};
