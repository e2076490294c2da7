//! Planning module for role synchronization.
//!
//! This module reconciles the cached roles with the desired roles and turns
//! the result into an ordered plan that is applied one role at a time.

mod reconcile;
mod plan;
mod executor;

pub use reconcile::{reconcile, RoleActionSet};
pub use plan::{ActionType, PlannedRoleAction, RolePlan};
pub use executor::{ActionFailure, CompletedAction, PlanExecutor};
