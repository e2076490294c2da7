//! Role plan types and construction.
//!
//! This module turns an action set into an ordered list of role actions,
//! each carrying the specs it needs to be applied.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{RoleSet, RoleSpec};
use crate::error::{Result, RoleSyncError};
use crate::sync::SyncPhase;

use super::reconcile::RoleActionSet;

/// A complete, ordered role plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the desired role set.
    pub desired_hash: String,
    /// Whether the plan was built without a cache.
    pub bootstrap: bool,
    /// Planned actions in execution order.
    pub actions: Vec<PlannedRoleAction>,
    /// Desired roles that need no action.
    pub unchanged: Vec<String>,
}

/// A single planned role action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoleAction {
    /// Action type.
    pub action_type: ActionType,
    /// Role name.
    pub role: String,
    /// Cached spec, if the role is cached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<RoleSpec>,
    /// Desired spec, unless the role is being removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<RoleSpec>,
    /// Reason for this action.
    pub reason: String,
}

/// Types of role actions, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    /// Create a role directory.
    Add,
    /// Delete a role directory.
    Remove,
    /// Update a git working tree in place.
    Update,
    /// Delete a role directory, then create it again.
    #[serde(rename = "clean-readd")]
    CleanReAdd,
}

impl ActionType {
    /// All action types in the order they are applied.
    pub const ORDER: [Self; 4] = [Self::Add, Self::Remove, Self::Update, Self::CleanReAdd];

    /// Returns the sync phase this action type runs in.
    #[must_use]
    pub const fn phase(self) -> SyncPhase {
        match self {
            Self::Add => SyncPhase::Add,
            Self::Remove => SyncPhase::Remove,
            Self::Update => SyncPhase::Update,
            Self::CleanReAdd => SyncPhase::CleanReAdd,
        }
    }
}

impl RolePlan {
    /// Creates a plan from an action set.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a bucket names a role missing from the
    /// set it should come from.
    pub fn from_actions(
        actions: &RoleActionSet,
        current: &RoleSet,
        desired: &RoleSet,
        desired_hash: &str,
        bootstrap: bool,
    ) -> Result<Self> {
        let mut planned = Vec::with_capacity(actions.len());

        for name in &actions.to_add {
            let want = lookup(desired, name, "desired")?;
            planned.push(PlannedRoleAction {
                action_type: ActionType::Add,
                role: name.clone(),
                current: None,
                desired: Some(want.clone()),
                reason: if bootstrap {
                    String::from("No role cache yet")
                } else {
                    String::from("Role added to configuration")
                },
            });
        }

        for name in &actions.to_remove {
            let have = lookup(current, name, "cached")?;
            planned.push(PlannedRoleAction {
                action_type: ActionType::Remove,
                role: name.clone(),
                current: Some(have.clone()),
                desired: None,
                reason: String::from("Role removed from configuration"),
            });
        }

        for name in &actions.to_update_in_place {
            let have = lookup(current, name, "cached")?;
            let want = lookup(desired, name, "desired")?;
            planned.push(PlannedRoleAction {
                action_type: ActionType::Update,
                role: name.clone(),
                current: Some(have.clone()),
                desired: Some(want.clone()),
                reason: update_reason(have, want),
            });
        }

        for name in &actions.to_clean_readd {
            let have = lookup(current, name, "cached")?;
            let want = lookup(desired, name, "desired")?;
            planned.push(PlannedRoleAction {
                action_type: ActionType::CleanReAdd,
                role: name.clone(),
                current: Some(have.clone()),
                desired: Some(want.clone()),
                reason: clean_readd_reason(have, want),
            });
        }

        let unchanged = desired
            .keys()
            .filter(|name| !actions.contains(name))
            .cloned()
            .collect();

        Ok(Self {
            created_at: Utc::now(),
            desired_hash: desired_hash.to_string(),
            bootstrap,
            actions: planned,
            unchanged,
        })
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of one type.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }

    /// Returns the actions of one type, in plan order.
    pub fn actions_of(&self, action_type: ActionType) -> impl Iterator<Item = &PlannedRoleAction> {
        self.actions
            .iter()
            .filter(move |a| a.action_type == action_type)
    }
}

fn lookup<'a>(roles: &'a RoleSet, name: &str, side: &str) -> Result<&'a RoleSpec> {
    roles
        .get(name)
        .ok_or_else(|| RoleSyncError::internal(format!("Role '{name}' missing from {side} roles")))
}

fn update_reason(have: &RoleSpec, want: &RoleSpec) -> String {
    if have.ref_type == want.ref_type && have.git_ref == want.git_ref {
        return String::from("Pull latest changes");
    }

    let describe = |spec: &RoleSpec| match &spec.ref_type {
        Some(ref_type) => format!("{ref_type} {}", spec.reference()),
        None => spec.reference().to_string(),
    };
    format!("Reference changed from {} to {}", describe(have), describe(want))
}

fn clean_readd_reason(have: &RoleSpec, want: &RoleSpec) -> String {
    if want.is_local() && have == want {
        String::from("Local roles are always re-copied")
    } else if have.location_type != want.location_type {
        format!(
            "Location type changed from {} to {}",
            have.location_type, want.location_type
        )
    } else if have.location != want.location {
        String::from("Location changed")
    } else {
        String::from("Local role re-copied")
    }
}

impl PlannedRoleAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Add => format!("Add role '{}'", self.role),
            ActionType::Remove => format!("Remove role '{}'", self.role),
            ActionType::Update => format!("Update role '{}' in place", self.role),
            ActionType::CleanReAdd => format!("Clean and re-add role '{}'", self.role),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::CleanReAdd => "clean-readd",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedRoleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action_type, self.role)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for RolePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Role Plan ({} actions):", self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {i}. {action}")?;
        }
        Ok(())
    }
}
