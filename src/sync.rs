//! Sync orchestrator.
//!
//! This module drives one full synchronization pass: it validates the desired
//! roles, bootstraps when no cache exists or reconciles against the cache
//! otherwise, and applies the resulting plan one role at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{RoleCache, RoleCacheStore};
use crate::config::{ConfigHasher, ConfigValidator, RoleSet};
use crate::error::{Result, RoleSyncError, SyncError, EXIT_APPLY, EXIT_CONFIG};
use crate::planner::{
    reconcile, ActionFailure, ActionType, CompletedAction, PlanExecutor, RoleActionSet, RolePlan,
};
use crate::source::RoleMaterializer;

/// Phase of a sync pass, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    /// Validation of the desired roles.
    Validate,
    /// Creating roles.
    Add,
    /// Removing roles.
    Remove,
    /// Updating git roles in place.
    Update,
    /// Recreating roles from scratch.
    #[serde(rename = "clean-readd")]
    CleanReAdd,
    /// Reading or writing the role cache.
    CacheIo,
}

impl SyncPhase {
    /// Returns the process exit code for a failure in this phase.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Validate | Self::CacheIo => EXIT_CONFIG,
            Self::Add | Self::Remove | Self::Update | Self::CleanReAdd => EXIT_APPLY,
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validate => "validate",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::CleanReAdd => "clean-readd",
            Self::CacheIo => "cache-io",
        };
        write!(f, "{s}")
    }
}

/// States of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    /// Nothing happened yet.
    NotStarted,
    /// Validating the desired roles.
    LoadingDesired,
    /// No cache exists; every desired role is added.
    NoCacheBootstrap,
    /// Reconciling the cache against the desired roles.
    Reconciling,
    /// Applying additions.
    ApplyingAdd,
    /// Applying removals.
    ApplyingRemove,
    /// Applying in-place updates.
    ApplyingUpdate,
    /// Applying clean-and-readd actions.
    ApplyingCleanReAdd,
    /// Every action completed.
    Done,
    /// The pass stopped at a failure.
    Failed,
}

impl SyncState {
    /// Returns the state in which actions of `action_type` are applied.
    #[must_use]
    pub const fn applying(action_type: ActionType) -> Self {
        match action_type {
            ActionType::Add => Self::ApplyingAdd,
            ActionType::Remove => Self::ApplyingRemove,
            ActionType::Update => Self::ApplyingUpdate,
            ActionType::CleanReAdd => Self::ApplyingCleanReAdd,
        }
    }
}

/// How current state was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// No cache existed.
    Bootstrap,
    /// The cache was reconciled against the desired roles.
    Reconcile,
}

/// Why a sync pass stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    /// Failing role, if the failure belongs to one.
    pub role: Option<String>,
    /// Phase of the failure.
    pub phase: SyncPhase,
    /// Underlying cause.
    pub cause: String,
    /// True when a role directory and the cache disagree.
    pub manual_intervention: bool,
}

/// Outcome of a sync pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Whether every action completed.
    pub success: bool,
    /// How current state was obtained, once known.
    pub mode: Option<SyncMode>,
    /// States visited, in order.
    pub states: Vec<SyncState>,
    /// The plan that was applied.
    pub plan: Option<RolePlan>,
    /// Actions that completed and were recorded in the cache.
    pub completed: Vec<CompletedAction>,
    /// Failure, if the pass stopped early.
    pub failure: Option<SyncFailure>,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass ended.
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    fn start() -> Self {
        Self {
            success: false,
            mode: None,
            states: vec![SyncState::NotStarted],
            plan: None,
            completed: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn enter(&mut self, state: SyncState) {
        debug!(?state, "Sync state");
        self.states.push(state);
    }

    fn finish(mut self) -> Self {
        self.enter(SyncState::Done);
        self.success = true;
        self.finished_at = Some(Utc::now());
        self
    }

    fn fail(mut self, failure: SyncFailure) -> Self {
        error!(
            role = failure.role.as_deref().unwrap_or("-"),
            phase = %failure.phase,
            cause = %failure.cause,
            "Sync failed"
        );
        self.enter(SyncState::Failed);
        self.failure = Some(failure);
        self.success = false;
        self.finished_at = Some(Utc::now());
        self
    }

    fn fail_pass(self, phase: SyncPhase, cause: &RoleSyncError) -> Self {
        self.fail(SyncFailure {
            role: None,
            phase,
            cause: cause.to_string(),
            manual_intervention: false,
        })
    }

    /// Returns the last state reached.
    #[must_use]
    pub fn final_state(&self) -> SyncState {
        self.states.last().copied().unwrap_or(SyncState::NotStarted)
    }

    /// Converts a failed report into the matching error.
    #[must_use]
    pub fn error(&self) -> Option<RoleSyncError> {
        let failure = self.failure.as_ref()?;
        let reason = failure.cause.clone();

        let err = match (&failure.role, failure.manual_intervention) {
            (Some(role), true) => SyncError::ManualInterventionRequired {
                role: role.clone(),
                reason,
            },
            (Some(role), false) if self.mode == Some(SyncMode::Bootstrap) => {
                SyncError::BootstrapFailed {
                    role: role.clone(),
                    reason,
                }
            }
            (Some(role), false) => SyncError::RoleFailed {
                role: role.clone(),
                phase: failure.phase,
                reason,
            },
            (None, _) => SyncError::PassFailed {
                phase: failure.phase,
                reason,
            },
        };
        Some(err.into())
    }

    /// Returns the process exit code for this report.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.error().map_or(0, |e| e.exit_code())
    }

    /// Converts the report into a result.
    ///
    /// # Errors
    ///
    /// Returns the failure of the pass, if any.
    pub fn into_result(self) -> Result<Self> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Drives synchronization passes against one roles directory.
#[derive(Debug)]
pub struct SyncOrchestrator<M, S> {
    /// Role materializer.
    materializer: M,
    /// Role cache store.
    store: S,
    /// Validator for desired roles.
    validator: ConfigValidator,
    /// Hasher for plan fingerprints.
    hasher: ConfigHasher,
}

impl<M: RoleMaterializer, S: RoleCacheStore> SyncOrchestrator<M, S> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(materializer: M, store: S) -> Self {
        Self {
            materializer,
            store,
            validator: ConfigValidator::new(),
            hasher: ConfigHasher::new(),
        }
    }

    /// Returns the role cache store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Reads the cache, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache exists but cannot be read.
    pub async fn cached(&self) -> Result<Option<RoleCache>> {
        if self.store.exists().await? {
            Ok(Some(self.store.read().await?))
        } else {
            Ok(None)
        }
    }

    /// Computes the plan a sync pass would apply, without touching disk.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the cache cannot be read.
    pub async fn plan(&self, desired: &RoleSet) -> Result<RolePlan> {
        self.validator.validate_roles_only(desired)?;
        let desired_hash = self.hasher.hash_roles(desired);

        match self.cached().await? {
            None => {
                let actions = RoleActionSet::bootstrap(desired);
                RolePlan::from_actions(&actions, &RoleSet::new(), desired, &desired_hash, true)
            }
            Some(cache) => {
                let actions = reconcile(&cache.roles, desired)?;
                RolePlan::from_actions(&actions, &cache.roles, desired, &desired_hash, false)
            }
        }
    }

    /// Runs one synchronization pass.
    ///
    /// The pass stops at the first failure. The cache always reflects the role
    /// actions completed before that point.
    pub async fn sync(&self, desired: &RoleSet) -> SyncReport {
        info!("Starting role sync for {} desired roles", desired.len());
        let mut report = SyncReport::start();

        report.enter(SyncState::LoadingDesired);
        if let Err(e) = self.validator.validate_roles_only(desired) {
            return report.fail_pass(SyncPhase::Validate, &e);
        }
        let desired_hash = self.hasher.hash_roles(desired);

        let cache_exists = match self.store.exists().await {
            Ok(exists) => exists,
            Err(e) => return report.fail_pass(SyncPhase::CacheIo, &e),
        };

        let (mut cache, actions, bootstrap) = if cache_exists {
            report.enter(SyncState::Reconciling);
            report.mode = Some(SyncMode::Reconcile);

            let cache = match self.store.read().await {
                Ok(cache) => cache,
                Err(e) => return report.fail_pass(SyncPhase::CacheIo, &e),
            };
            let actions = match reconcile(&cache.roles, desired) {
                Ok(actions) => actions,
                Err(e) => return report.fail_pass(SyncPhase::Validate, &e),
            };
            (cache, actions, false)
        } else {
            info!("No role cache found, installing every role");
            report.enter(SyncState::NoCacheBootstrap);
            report.mode = Some(SyncMode::Bootstrap);
            (RoleCache::new(), RoleActionSet::bootstrap(desired), true)
        };

        let plan = match RolePlan::from_actions(&actions, &cache.roles, desired, &desired_hash, bootstrap) {
            Ok(plan) => plan,
            Err(e) => return report.fail_pass(SyncPhase::Validate, &e),
        };
        info!(
            add = actions.to_add.len(),
            remove = actions.to_remove.len(),
            update = actions.to_update_in_place.len(),
            clean_readd = actions.to_clean_readd.len(),
            "Planned role actions"
        );
        report.plan = Some(plan.clone());

        let executor = PlanExecutor::new(&self.materializer, &self.store);

        for action_type in ActionType::ORDER {
            report.enter(SyncState::applying(action_type));

            for action in plan.actions_of(action_type) {
                match executor.apply(action, &mut cache).await {
                    Ok(done) => report.completed.push(done),
                    Err(failure) => {
                        let failure = self.settle_failure(failure, &cache, bootstrap).await;
                        return report.fail(failure);
                    }
                }
            }
        }

        info!("Role sync complete: {} actions applied", report.completed.len());
        report.finish()
    }

    /// Writes the partial cache after a failed bootstrap and turns the action
    /// failure into a report failure.
    async fn settle_failure(
        &self,
        failure: ActionFailure,
        cache: &RoleCache,
        bootstrap: bool,
    ) -> SyncFailure {
        let mut manual_intervention = failure.manual_intervention;

        if bootstrap && !manual_intervention {
            info!("Writing partial role cache with {} roles", cache.len());
            if let Err(e) = self.store.write(cache).await {
                error!(error = %e, "Failed to write partial role cache");
                manual_intervention = true;
            }
        }

        SyncFailure {
            role: Some(failure.role),
            phase: failure.action_type.phase(),
            cause: failure.cause.to_string(),
            manual_intervention,
        }
    }

    /// Removes every role directory and the cache.
    ///
    /// Returns `false` when there was no cache, and therefore nothing to clean.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the cache cannot be removed.
    pub async fn reset(&self) -> Result<bool> {
        if !self.store.exists().await? {
            warn!("No role cache found, nothing to clean");
            return Ok(false);
        }

        info!("Removing all roles");
        self.materializer.clear_all().await?;
        self.store.delete().await?;
        info!("All roles and the role cache removed");
        Ok(true)
    }
}
