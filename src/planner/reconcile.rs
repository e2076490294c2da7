//! Reconciliation of cached roles against desired roles.
//!
//! This module computes which roles have to be added, updated in place,
//! cleaned and re-added, or removed. It is pure: nothing here touches disk.

use serde::Serialize;
use tracing::debug;

use crate::config::{RoleSet, RoleSpec};
use crate::error::Result;

/// The four disjoint action buckets of a sync pass.
///
/// Every bucket is sorted by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleActionSet {
    /// Roles present in the desired set only.
    pub to_add: Vec<String>,
    /// Git roles whose working tree can be updated without recloning.
    pub to_update_in_place: Vec<String>,
    /// Roles whose directory must be deleted and recreated.
    pub to_clean_readd: Vec<String>,
    /// Roles present in the cache only.
    pub to_remove: Vec<String>,
}

impl RoleActionSet {
    /// Builds the action set used when no cache exists: every desired role is added.
    #[must_use]
    pub fn bootstrap(desired: &RoleSet) -> Self {
        Self {
            to_add: desired.keys().cloned().collect(),
            ..Self::default()
        }
    }

    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty()
            && self.to_update_in_place.is_empty()
            && self.to_clean_readd.is_empty()
            && self.to_remove.is_empty()
    }

    /// Returns the total number of role actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_add.len()
            + self.to_update_in_place.len()
            + self.to_clean_readd.len()
            + self.to_remove.len()
    }

    /// Returns true if `name` is in any bucket.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        [
            &self.to_add,
            &self.to_update_in_place,
            &self.to_clean_readd,
            &self.to_remove,
        ]
        .iter()
        .any(|bucket| bucket.iter().any(|n| n == name))
    }
}

/// Computes the action buckets that turn `current` into `desired`.
///
/// Only the location type of desired roles is checked here; a single
/// unsupported type fails the whole call and no buckets are returned.
///
/// # Errors
///
/// Returns a configuration error if a desired role has an unsupported
/// location type.
pub fn reconcile(current: &RoleSet, desired: &RoleSet) -> Result<RoleActionSet> {
    let mut actions = RoleActionSet::default();

    for (name, want) in desired {
        want.check_location_type(name)?;

        match current.get(name) {
            None => actions.to_add.push(name.clone()),
            Some(_) if want.is_local() => actions.to_clean_readd.push(name.clone()),
            Some(have) if have == want => {
                debug!(role = %name, "Role unchanged");
            }
            Some(have) if is_updatable(have, want) => {
                actions.to_update_in_place.push(name.clone());
            }
            Some(_) => actions.to_clean_readd.push(name.clone()),
        }
    }

    actions.to_remove = current
        .keys()
        .filter(|name| !desired.contains_key(*name))
        .cloned()
        .collect();

    debug!(
        add = actions.to_add.len(),
        update = actions.to_update_in_place.len(),
        clean_readd = actions.to_clean_readd.len(),
        remove = actions.to_remove.len(),
        "Reconciled roles"
    );
    Ok(actions)
}

/// A git role can be updated in place when it already was a git role cloned
/// from the same location.
fn is_updatable(current: &RoleSpec, desired: &RoleSpec) -> bool {
    current.is_git() && desired.is_git() && current.location == desired.location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationType;
    use crate::error::{ConfigError, RoleSyncError};

    fn set(entries: &[(&str, RoleSpec)]) -> RoleSet {
        entries
            .iter()
            .map(|(name, spec)| ((*name).to_string(), spec.clone()))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_add_only() {
        let current = set(&[("A", RoleSpec::git_branch("repoX", "main"))]);
        let desired = set(&[
            ("A", RoleSpec::git_branch("repoX", "main")),
            ("B", RoleSpec::local("/src/B")),
        ]);

        let actions = reconcile(&current, &desired).expect("reconcile should succeed");
        assert_eq!(
            actions,
            RoleActionSet {
                to_add: names(&["B"]),
                ..RoleActionSet::default()
            }
        );
    }

    #[test]
    fn test_location_change_and_removal() {
        let current = set(&[
            ("A", RoleSpec::git_branch("repoX", "main")),
            ("C", RoleSpec::local("/x")),
        ]);
        let desired = set(&[("A", RoleSpec::git_branch("repoY", "main"))]);

        let actions = reconcile(&current, &desired).expect("reconcile should succeed");
        assert_eq!(
            actions,
            RoleActionSet {
                to_clean_readd: names(&["A"]),
                to_remove: names(&["C"]),
                ..RoleActionSet::default()
            }
        );
    }

    #[test]
    fn test_identical_git_roles_are_skipped() {
        let state = set(&[
            ("a", RoleSpec::git_branch("repoX", "main")),
            ("b", RoleSpec::git_tag("repoY", "v1.2.0")),
            ("c", RoleSpec::git_branch("repoZ", "dev")),
        ]);

        let actions = reconcile(&state, &state).expect("reconcile should succeed");
        assert!(actions.is_empty());
    }

    #[test]
    fn test_identical_local_role_is_recopied() {
        let state = set(&[("common", RoleSpec::local("/srv/common"))]);

        let actions = reconcile(&state, &state).expect("reconcile should succeed");
        assert_eq!(actions.to_clean_readd, names(&["common"]));
        assert!(actions.to_update_in_place.is_empty());
    }

    #[test]
    fn test_ref_change_updates_in_place() {
        let current = set(&[("kube", RoleSpec::git_branch("repoX", "main"))]);

        for desired_spec in [
            RoleSpec::git_branch("repoX", "dev"),
            RoleSpec::git_tag("repoX", "v2.0.0"),
            RoleSpec::git_tag("repoX", "main"),
        ] {
            let desired = set(&[("kube", desired_spec)]);
            let actions = reconcile(&current, &desired).expect("reconcile should succeed");
            assert_eq!(actions.to_update_in_place, names(&["kube"]));
            assert_eq!(actions.len(), 1);
        }
    }

    #[test]
    fn test_location_change_recreates_regardless_of_ref() {
        let current = set(&[("kube", RoleSpec::git_branch("repoX", "main"))]);

        for desired_spec in [
            RoleSpec::git_branch("repoY", "main"),
            RoleSpec::git_branch("repoY", "dev"),
            RoleSpec::git_tag("repoY", "v1"),
        ] {
            let desired = set(&[("kube", desired_spec)]);
            let actions = reconcile(&current, &desired).expect("reconcile should succeed");
            assert_eq!(actions.to_clean_readd, names(&["kube"]));
            assert_eq!(actions.len(), 1);
        }
    }

    #[test]
    fn test_local_to_git_recreates() {
        let current = set(&[("kube", RoleSpec::local("repoX"))]);
        let desired = set(&[("kube", RoleSpec::git_branch("repoX", "main"))]);

        let actions = reconcile(&current, &desired).expect("reconcile should succeed");
        assert_eq!(actions.to_clean_readd, names(&["kube"]));
    }

    #[test]
    fn test_unsupported_location_type_returns_no_buckets() {
        let mut ftp = RoleSpec::local("ftp://example.com/role");
        ftp.location_type = LocationType::Unsupported(String::from("ftp"));

        let current = set(&[("old", RoleSpec::local("/old"))]);
        let desired = set(&[
            ("a", RoleSpec::git_branch("repoX", "main")),
            ("m", ftp),
            ("z", RoleSpec::local("/z")),
        ]);

        let result = reconcile(&current, &desired);
        assert!(matches!(
            result,
            Err(RoleSyncError::Config(ConfigError::UnsupportedLocationType { .. }))
        ));
    }

    #[test]
    fn test_buckets_are_disjoint_and_cover_every_name() {
        let specs = [
            RoleSpec::git_branch("repoX", "main"),
            RoleSpec::git_branch("repoX", "dev"),
            RoleSpec::git_tag("repoX", "v1"),
            RoleSpec::git_branch("repoY", "main"),
            RoleSpec::local("/src/a"),
            RoleSpec::local("repoX"),
        ];

        // Every combination of absent/present-with-spec for one role on each side.
        let mut options: Vec<Option<&RoleSpec>> = vec![None];
        options.extend(specs.iter().map(Some));

        for have in &options {
            for want in &options {
                let current: RoleSet = have
                    .iter()
                    .map(|s| (String::from("r"), (*s).clone()))
                    .chain(std::iter::once((String::from("keep"), specs[0].clone())))
                    .collect();
                let desired: RoleSet = want
                    .iter()
                    .map(|s| (String::from("r"), (*s).clone()))
                    .chain(std::iter::once((String::from("keep"), specs[0].clone())))
                    .collect();

                let actions = reconcile(&current, &desired).expect("reconcile should succeed");
                let total = actions.len();
                let hits = [
                    &actions.to_add,
                    &actions.to_update_in_place,
                    &actions.to_clean_readd,
                    &actions.to_remove,
                ]
                .iter()
                .filter(|bucket| bucket.iter().any(|n| n == "r"))
                .count();

                assert!(!actions.contains("keep"));
                match (have, want) {
                    (None, None) => assert_eq!(total, 0),
                    (Some(h), Some(w)) if h == w && w.is_git() => assert_eq!(total, 0),
                    _ => {
                        assert_eq!(hits, 1, "role must be in exactly one bucket: {have:?} -> {want:?}");
                        assert_eq!(total, 1);
                    }
                }
            }
        }
    }

    #[test]
    fn test_bootstrap_adds_everything() {
        let desired = set(&[
            ("b", RoleSpec::local("/b")),
            ("a", RoleSpec::git_branch("repoX", "main")),
        ]);

        let actions = RoleActionSet::bootstrap(&desired);
        assert_eq!(actions.to_add, names(&["a", "b"]));
        assert_eq!(actions.len(), 2);
    }
}
