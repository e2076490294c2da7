//! Plan executor for applying role plans.
//!
//! Every role action is applied through the materializer and then recorded in
//! the cache, which is persisted before the next action starts.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::cache::{RoleCache, RoleCacheStore};
use crate::config::RoleSpec;
use crate::error::{RoleSyncError, SourceError};
use crate::source::RoleMaterializer;

use super::plan::{ActionType, PlannedRoleAction};

/// Executor for role plans.
#[derive(Debug)]
pub struct PlanExecutor<'a, M: ?Sized, S: ?Sized> {
    /// Role materializer.
    materializer: &'a M,
    /// Role cache store.
    store: &'a S,
}

/// A role action that completed and was recorded in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Role name.
    pub role: String,
}

/// A role action that failed.
#[derive(Debug)]
pub struct ActionFailure {
    /// Action type.
    pub action_type: ActionType,
    /// Role name.
    pub role: String,
    /// Underlying error.
    pub cause: RoleSyncError,
    /// True when the role directory and the cache no longer agree.
    pub manual_intervention: bool,
}

impl<'a, M, S> PlanExecutor<'a, M, S>
where
    M: RoleMaterializer + ?Sized,
    S: RoleCacheStore + ?Sized,
{
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(materializer: &'a M, store: &'a S) -> Self {
        Self {
            materializer,
            store,
        }
    }

    /// Applies one role action and persists the updated cache.
    ///
    /// # Errors
    ///
    /// Returns the failure if either the materializer or the cache write fails.
    /// A cache write failure after a successful materialization is flagged as
    /// needing manual intervention.
    pub async fn apply(
        &self,
        action: &PlannedRoleAction,
        cache: &mut RoleCache,
    ) -> std::result::Result<CompletedAction, ActionFailure> {
        let role = action.role.as_str();
        info!(role, action = %action.action_type, "{}", action.description());

        match action.action_type {
            ActionType::Add => {
                let desired = desired_spec(action)?;
                self.materializer
                    .create(role, desired)
                    .await
                    .map_err(|e| failure(action, e))?;
                cache.record(role, desired.clone());
            }
            ActionType::Remove => {
                self.materializer
                    .clear(role)
                    .await
                    .map_err(|e| failure(action, e))?;
                cache.forget(role);
            }
            ActionType::Update => {
                let current = current_spec(action)?;
                let desired = desired_spec(action)?;
                self.materializer
                    .update_git_in_place(role, current, desired)
                    .await
                    .map_err(|e| failure(action, e))?;
                cache.record(role, desired.clone());
            }
            ActionType::CleanReAdd => {
                let desired = desired_spec(action)?;
                self.materializer
                    .clear(role)
                    .await
                    .map_err(|e| failure(action, e))?;

                if let Err(e) = self.materializer.create(role, desired).await {
                    // The directory is gone, so the cached spec no longer describes it.
                    cache.forget(role);
                    let mut failed = failure(action, e);
                    if let Err(write_err) = self.store.write(cache).await {
                        error!(role, error = %write_err, "Failed to drop role from cache");
                        failed.manual_intervention = true;
                    }
                    return Err(failed);
                }
                cache.record(role, desired.clone());
            }
        }

        self.persist(action, cache).await?;
        debug!(role, action = %action.action_type, "Role action recorded");

        Ok(CompletedAction {
            action_type: action.action_type,
            role: action.role.clone(),
        })
    }

    /// Persists the cache after a successful materialization.
    async fn persist(
        &self,
        action: &PlannedRoleAction,
        cache: &RoleCache,
    ) -> std::result::Result<(), ActionFailure> {
        self.store.write(cache).await.map_err(|e| {
            error!(
                role = %action.role,
                error = %e,
                "Role was materialized but the cache could not be written"
            );
            ActionFailure {
                action_type: action.action_type,
                role: action.role.clone(),
                cause: e,
                manual_intervention: true,
            }
        })
    }
}

fn failure(action: &PlannedRoleAction, cause: RoleSyncError) -> ActionFailure {
    error!(role = %action.role, action = %action.action_type, error = %cause, "Role action failed");
    ActionFailure {
        action_type: action.action_type,
        role: action.role.clone(),
        cause,
        manual_intervention: false,
    }
}

fn desired_spec(action: &PlannedRoleAction) -> std::result::Result<&RoleSpec, ActionFailure> {
    action.desired.as_ref().ok_or_else(|| {
        failure(
            action,
            SourceError::invalid_spec(&action.role, "no desired spec in plan").into(),
        )
    })
}

fn current_spec(action: &PlannedRoleAction) -> std::result::Result<&RoleSpec, ActionFailure> {
    action.current.as_ref().ok_or_else(|| {
        failure(
            action,
            SourceError::invalid_spec(&action.role, "no cached spec in plan").into(),
        )
    })
}
