//! Per-role materialization primitives.
//!
//! Each primitive touches exactly one role directory (or, for
//! [`RoleMaterializer::clear_all`], every role directory) and never the cache.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{LocationType, PathsConfig, RefType, RoleSpec};
use crate::error::{Result, SourceError};

use super::copy::{copy_tree, list_subdirs, remove_tree};
use super::git::GitCli;

/// Operations that bring role directories in line with role specs.
#[async_trait]
pub trait RoleMaterializer: Send + Sync {
    /// Clones a git role at its branch or tag.
    async fn create_git(&self, name: &str, spec: &RoleSpec) -> Result<()>;

    /// Copies a local role source into the role directory.
    async fn create_local(&self, name: &str, spec: &RoleSpec) -> Result<()>;

    /// Updates an existing git working tree from `current` to `desired`.
    async fn update_git_in_place(
        &self,
        name: &str,
        current: &RoleSpec,
        desired: &RoleSpec,
    ) -> Result<()>;

    /// Removes a role directory.
    async fn clear(&self, name: &str) -> Result<()>;

    /// Removes every role directory.
    async fn clear_all(&self) -> Result<()>;

    /// Creates a role from whichever source its spec names.
    async fn create(&self, name: &str, spec: &RoleSpec) -> Result<()> {
        match &spec.location_type {
            LocationType::Git => self.create_git(name, spec).await,
            LocationType::Local => self.create_local(name, spec).await,
            LocationType::Unsupported(other) => Err(SourceError::invalid_spec(
                name,
                format!("unsupported location type '{other}'"),
            )
            .into()),
        }
    }
}

/// Materializer backed by the `git` CLI and the local filesystem.
#[derive(Debug, Clone)]
pub struct RoleSourceMaterializer {
    /// Directory holding one subdirectory per role.
    roles_dir: PathBuf,
    /// Git client.
    git: GitCli,
}

impl RoleSourceMaterializer {
    /// Creates a materializer rooted at `roles_dir`.
    #[must_use]
    pub fn new(roles_dir: impl Into<PathBuf>) -> Self {
        Self {
            roles_dir: roles_dir.into(),
            git: GitCli::new(),
        }
    }

    /// Creates a materializer from the configured directory layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the roles directory cannot be resolved.
    pub fn from_paths(paths: &PathsConfig) -> Result<Self> {
        Ok(Self::new(paths.resolve_roles_dir()?))
    }

    /// Uses a custom git client.
    #[must_use]
    pub fn with_git(mut self, git: GitCli) -> Self {
        self.git = git;
        self
    }

    /// Returns the roles directory.
    #[must_use]
    pub fn roles_dir(&self) -> &Path {
        &self.roles_dir
    }

    /// Returns the directory of a single role.
    #[must_use]
    pub fn role_dir(&self, name: &str) -> PathBuf {
        self.roles_dir.join(name)
    }

    async fn ensure_roles_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.roles_dir).await?;
        Ok(())
    }
}

/// Resolved git coordinates of a spec.
struct GitTarget<'a> {
    ref_type: &'a RefType,
    reference: &'a str,
    qualified: String,
}

fn git_target<'a>(name: &str, spec: &'a RoleSpec) -> Result<GitTarget<'a>> {
    if !spec.is_git() {
        return Err(SourceError::invalid_spec(name, "not a git role").into());
    }

    let ref_type = spec
        .ref_type
        .as_ref()
        .ok_or_else(|| SourceError::invalid_spec(name, "missing refType"))?;
    let reference = spec.reference();
    if reference.is_empty() {
        return Err(SourceError::invalid_spec(name, "missing ref").into());
    }
    let qualified = ref_type.qualify(reference).ok_or_else(|| {
        SourceError::invalid_spec(name, format!("unsupported refType '{ref_type}'"))
    })?;

    Ok(GitTarget {
        ref_type,
        reference,
        qualified,
    })
}

#[async_trait]
impl RoleMaterializer for RoleSourceMaterializer {
    async fn create_git(&self, name: &str, spec: &RoleSpec) -> Result<()> {
        let target = git_target(name, spec)?;
        let dest = self.role_dir(name);

        info!(role = name, location = %spec.location, reference = %target.qualified, "Cloning role");

        self.git
            .ls_remote(name, &spec.location, &target.qualified)
            .await?;
        self.ensure_roles_dir().await?;
        self.git
            .clone_shallow(name, &spec.location, target.reference, &dest)
            .await
    }

    async fn create_local(&self, name: &str, spec: &RoleSpec) -> Result<()> {
        if !spec.is_local() {
            return Err(SourceError::invalid_spec(name, "not a local role").into());
        }

        let dest = self.role_dir(name);
        info!(role = name, location = %spec.location, "Copying local role");

        self.ensure_roles_dir().await?;
        if dest.exists() {
            warn!(role = name, "Replacing leftover role directory {}", dest.display());
            remove_tree(&dest).await?;
        }
        copy_tree(name, Path::new(&spec.location), &dest).await?;
        Ok(())
    }

    async fn update_git_in_place(
        &self,
        name: &str,
        current: &RoleSpec,
        desired: &RoleSpec,
    ) -> Result<()> {
        let from = git_target(name, current)?;
        let to = git_target(name, desired)?;
        let dir = self.role_dir(name);

        if !dir.join(".git").exists() {
            return Err(SourceError::NotARepository {
                role: name.to_string(),
                path: dir,
            }
            .into());
        }

        if from.qualified == to.qualified {
            info!(role = name, reference = %to.qualified, "Pulling role");
            return self.git.pull_ff_only(name, &dir, to.reference).await;
        }

        info!(
            role = name,
            from = %from.qualified,
            to = %to.qualified,
            "Switching role reference"
        );

        let refspec = to.ref_type.refspec(to.reference).ok_or_else(|| {
            SourceError::invalid_spec(name, format!("unsupported refType '{}'", to.ref_type))
        })?;
        self.git.fetch(name, &dir, &refspec).await?;

        match to.ref_type {
            RefType::Tag => self.git.checkout_tag(name, &dir, to.reference).await,
            _ => self.git.checkout_branch(name, &dir, to.reference).await,
        }
    }

    async fn clear(&self, name: &str) -> Result<()> {
        info!(role = name, "Removing role directory");
        remove_tree(&self.role_dir(name)).await
    }

    async fn clear_all(&self) -> Result<()> {
        let dirs = list_subdirs(&self.roles_dir).await?;
        info!("Removing {} role directories", dirs.len());

        for dir in dirs {
            debug!("Removing {}", dir.display());
            remove_tree(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoleSyncError;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .output()
            .expect("git should run");
        assert!(
            status.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&status.stderr)
        );
    }

    fn head_file(dir: &Path, file: &str) -> String {
        std::fs::read_to_string(dir.join(file)).expect("file should exist")
    }

    /// Creates an upstream repository with a `main` branch, a `dev` branch and
    /// a `v1` tag. Returns its `file://` URL.
    fn make_upstream(root: &Path) -> (PathBuf, String) {
        let repo = root.join("upstream");
        std::fs::create_dir_all(&repo).expect("create upstream");
        git(&repo, &["init", "--quiet"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(repo.join("VERSION"), "main-1\n").expect("write version");
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "--quiet", "-m", "first"]);
        git(&repo, &["tag", "v1"]);

        git(&repo, &["checkout", "--quiet", "-b", "dev"]);
        std::fs::write(repo.join("VERSION"), "dev-1\n").expect("write version");
        git(&repo, &["commit", "--quiet", "-am", "dev"]);
        git(&repo, &["checkout", "--quiet", "main"]);

        let url = format!("file://{}", repo.display());
        (repo, url)
    }

    #[tokio::test]
    async fn test_create_git_branch_and_tag() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (_repo, url) = make_upstream(temp.path());
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));

        materializer
            .create_git("kube", &RoleSpec::git_branch(&url, "dev"))
            .await
            .expect("branch clone should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "dev-1\n");

        materializer
            .create_git("pinned", &RoleSpec::git_tag(&url, "v1"))
            .await
            .expect("tag clone should succeed");
        assert_eq!(head_file(&materializer.role_dir("pinned"), "VERSION"), "main-1\n");
    }

    #[tokio::test]
    async fn test_create_git_unknown_ref() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (_repo, url) = make_upstream(temp.path());
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));

        let result = materializer
            .create_git("kube", &RoleSpec::git_branch(&url, "missing"))
            .await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::RefNotFound { .. }))
        ));
        assert!(!materializer.role_dir("kube").exists());

        // A tag name is not a branch.
        let result = materializer
            .create_git("kube", &RoleSpec::git_branch(&url, "v1"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_git_bad_remote() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let url = format!("file://{}", temp.path().join("nowhere").display());
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));

        let result = materializer
            .create_git("kube", &RoleSpec::git_branch(&url, "main"))
            .await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::Git { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_git_rejects_unsupported_ref_type() {
        let temp = TempDir::new().expect("temp dir");
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let spec = RoleSpec::git(
            "https://example.com/x.git",
            RefType::Unsupported(String::from("commit")),
            "abc",
        );

        let result = materializer.create_git("kube", &spec).await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::InvalidSpec { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_same_ref_pulls() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (repo, url) = make_upstream(temp.path());
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let spec = RoleSpec::git_branch(&url, "main");

        materializer.create_git("kube", &spec).await.expect("clone");

        // Up to date is success.
        materializer
            .update_git_in_place("kube", &spec, &spec)
            .await
            .expect("pull with no changes should succeed");

        std::fs::write(repo.join("VERSION"), "main-2\n").expect("write version");
        git(&repo, &["commit", "--quiet", "-am", "second"]);

        materializer
            .update_git_in_place("kube", &spec, &spec)
            .await
            .expect("pull should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-2\n");
    }

    #[tokio::test]
    async fn test_update_switches_branch_and_tag() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (_repo, url) = make_upstream(temp.path());
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let main = RoleSpec::git_branch(&url, "main");
        let dev = RoleSpec::git_branch(&url, "dev");
        let tag = RoleSpec::git_tag(&url, "v1");

        materializer.create_git("kube", &main).await.expect("clone");

        materializer
            .update_git_in_place("kube", &main, &dev)
            .await
            .expect("switch to dev should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "dev-1\n");

        materializer
            .update_git_in_place("kube", &dev, &tag)
            .await
            .expect("switch to tag should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-1\n");
    }

    #[tokio::test]
    async fn test_update_missing_ref_fails() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (_repo, url) = make_upstream(temp.path());
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let main = RoleSpec::git_branch(&url, "main");

        materializer.create_git("kube", &main).await.expect("clone");

        let result = materializer
            .update_git_in_place("kube", &main, &RoleSpec::git_branch(&url, "gone"))
            .await;
        assert!(result.is_err());
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-1\n");
    }

    #[tokio::test]
    async fn test_update_requires_working_tree() {
        let temp = TempDir::new().expect("temp dir");
        let materializer = RoleSourceMaterializer::new(temp.path());
        std::fs::create_dir_all(materializer.role_dir("kube")).expect("create role dir");
        let spec = RoleSpec::git_branch("https://example.com/x.git", "main");

        let result = materializer.update_git_in_place("kube", &spec, &spec).await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::NotARepository { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_git_binary() {
        let temp = TempDir::new().expect("temp dir");
        let materializer = RoleSourceMaterializer::new(temp.path())
            .with_git(GitCli::with_program("definitely-not-git-rolesync"));

        let result = materializer
            .create_git("kube", &RoleSpec::git_branch("https://example.com/x.git", "main"))
            .await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::GitUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_local_and_clear() {
        let temp = TempDir::new().expect("temp dir");
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("tasks")).expect("create source");
        std::fs::write(src.join("tasks/main.yml"), "---\n").expect("write task");
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));

        materializer
            .create("common", &RoleSpec::local(src.display().to_string()))
            .await
            .expect("copy should succeed");
        assert!(materializer.role_dir("common").join("tasks/main.yml").exists());

        materializer.clear("common").await.expect("clear should succeed");
        assert!(!materializer.role_dir("common").exists());
        materializer.clear("common").await.expect("clearing twice is fine");
    }

    #[tokio::test]
    async fn test_create_local_replaces_leftover_dir() {
        let temp = TempDir::new().expect("temp dir");
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("tasks")).expect("create source");
        std::fs::write(src.join("tasks/main.yml"), "---\n").expect("write task");
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let leftover = materializer.role_dir("common");
        std::fs::create_dir_all(&leftover).expect("create leftover");
        std::fs::write(leftover.join("stale.yml"), "old\n").expect("write stale file");

        materializer
            .create_local("common", &RoleSpec::local(src.display().to_string()))
            .await
            .expect("copy over a leftover directory should succeed");

        assert!(leftover.join("tasks/main.yml").exists());
        assert!(!leftover.join("stale.yml").exists());
    }

    #[tokio::test]
    async fn test_update_ref_type_change_checks_out_new_ref() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (repo, url) = make_upstream(temp.path());
        // A tag named like the branch, pointing at a different commit.
        git(&repo, &["tag", "main", "dev"]);
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let branch = RoleSpec::git_branch(&url, "main");
        let tag = RoleSpec::git_tag(&url, "main");

        materializer.create_git("kube", &branch).await.expect("clone");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-1\n");

        materializer
            .update_git_in_place("kube", &branch, &tag)
            .await
            .expect("switch from branch to tag of the same name should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "dev-1\n");

        materializer
            .update_git_in_place("kube", &tag, &branch)
            .await
            .expect("switch back to the branch should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-1\n");
    }

    #[tokio::test]
    async fn test_update_from_tag_clone() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().expect("temp dir");
        let (repo, url) = make_upstream(temp.path());
        git(&repo, &["tag", "v2", "dev"]);
        let materializer = RoleSourceMaterializer::new(temp.path().join("roles"));
        let v1 = RoleSpec::git_tag(&url, "v1");
        let v2 = RoleSpec::git_tag(&url, "v2");
        let dev = RoleSpec::git_branch(&url, "dev");

        materializer.create_git("kube", &v1).await.expect("tag clone");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-1\n");

        materializer
            .update_git_in_place("kube", &v1, &dev)
            .await
            .expect("switch from tag to branch should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "dev-1\n");

        materializer
            .update_git_in_place("kube", &dev, &v1)
            .await
            .expect("switch back to the tag should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "main-1\n");

        materializer
            .update_git_in_place("kube", &v1, &v2)
            .await
            .expect("switch between tags should succeed");
        assert_eq!(head_file(&materializer.role_dir("kube"), "VERSION"), "dev-1\n");
    }

    #[tokio::test]
    async fn test_clear_all_keeps_cache_file() {
        let temp = TempDir::new().expect("temp dir");
        let materializer = RoleSourceMaterializer::new(temp.path());
        std::fs::create_dir_all(materializer.role_dir("a/tasks")).expect("create a");
        std::fs::create_dir_all(materializer.role_dir("b")).expect("create b");
        std::fs::write(temp.path().join(".role-cache.json"), "{}").expect("write cache");

        materializer.clear_all().await.expect("clear_all should succeed");

        assert!(!materializer.role_dir("a").exists());
        assert!(!materializer.role_dir("b").exists());
        assert!(temp.path().join(".role-cache.json").exists());
    }

    #[tokio::test]
    async fn test_clear_all_unreadable_root() {
        let temp = TempDir::new().expect("temp dir");
        let materializer = RoleSourceMaterializer::new(temp.path().join("missing"));
        assert!(materializer.clear_all().await.is_err());
    }

    #[tokio::test]
    async fn test_create_dispatch_rejects_unsupported() {
        let temp = TempDir::new().expect("temp dir");
        let materializer = RoleSourceMaterializer::new(temp.path());
        let mut spec = RoleSpec::local("/srv/x");
        spec.location_type = LocationType::Unsupported(String::from("ftp"));

        assert!(materializer.create("x", &spec).await.is_err());
    }
}
