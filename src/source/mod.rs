//! Role source module.
//!
//! This module materializes roles on disk:
//! - Shallow git clones, pulls and reference switches through the `git` CLI
//! - Recursive copies of local role directories
//! - Removal of single role directories or all of them

mod copy;
mod git;
mod materializer;

pub use copy::{copy_tree, remove_tree, CopyStats};
pub use git::GitCli;
pub use materializer::{RoleMaterializer, RoleSourceMaterializer};
