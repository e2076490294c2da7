//! Filesystem primitives for local roles: recursive copy and removal.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, RoleSyncError, SourceError};

/// Summary of a finished copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Regular files copied.
    pub files: usize,
    /// Directories created.
    pub dirs: usize,
    /// Symbolic links recreated.
    pub links: usize,
}

/// Recursively copies `source` into `dest`.
///
/// `dest` must not exist yet. Symbolic links are recreated as links on unix
/// and copied as their target content elsewhere. A copy that fails partway
/// removes what it wrote, so `dest` is absent again afterwards.
///
/// # Errors
///
/// Returns an error if the source is not a readable directory, the destination
/// already exists, or any entry fails to copy.
pub async fn copy_tree(role: &str, source: &Path, dest: &Path) -> Result<CopyStats> {
    let role = role.to_string();
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || copy_tree_blocking(&role, &source, &dest))
        .await
        .map_err(|e| RoleSyncError::internal(format!("Copy task panicked: {e}")))?
}

fn copy_tree_blocking(role: &str, source: &Path, dest: &Path) -> Result<CopyStats> {
    let is_dir = std::fs::metadata(source).is_ok_and(|m| m.is_dir());
    if !is_dir {
        return Err(SourceError::LocalSourceMissing {
            role: role.to_string(),
            path: source.to_path_buf(),
        }
        .into());
    }

    if dest.exists() {
        return Err(copy_failed(
            role,
            format!("destination {} already exists", dest.display()),
        ));
    }

    let stats = match copy_entries(role, source, dest) {
        Ok(stats) => stats,
        Err(e) => {
            match std::fs::remove_dir_all(dest) {
                Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => {
                    warn!(role, error = %cleanup, "Failed to remove partial copy at {}", dest.display());
                }
                _ => {}
            }
            return Err(e);
        }
    };

    debug!(
        role,
        files = stats.files,
        dirs = stats.dirs,
        links = stats.links,
        "Copied local role source"
    );
    Ok(stats)
}

fn copy_entries(role: &str, source: &Path, dest: &Path) -> Result<CopyStats> {
    let mut stats = CopyStats::default();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| copy_failed(role, format!("failed to walk source: {e}")))?;
        let rel_path = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| copy_failed(role, e.to_string()))?;
        let target = dest.join(rel_path);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| copy_failed(role, format!("{}: {e}", target.display())))?;
            stats.dirs += 1;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)
                .map_err(|e| copy_failed(role, format!("{}: {e}", entry.path().display())))?;
            stats.links += 1;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| copy_failed(role, format!("{}: {e}", entry.path().display())))?;
            stats.files += 1;
        }
    }

    Ok(stats)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    let points_to = std::fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::copy(link, target).map(|_| ())
}

fn copy_failed(role: &str, message: impl Into<String>) -> RoleSyncError {
    SourceError::CopyFailed {
        role: role.to_string(),
        message: message.into(),
    }
    .into()
}

/// Removes a directory tree. A missing directory counts as removed.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub async fn remove_tree(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Nothing to remove at {}", path.display());
            Ok(())
        }
        Err(e) => Err(SourceError::RemoveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
        .into()),
    }
}

/// Lists the subdirectories of `root`, skipping plain files.
///
/// # Errors
///
/// Returns an error if `root` cannot be read.
pub async fn list_subdirs(root: &Path) -> Result<Vec<PathBuf>> {
    let read_failed = |e: std::io::Error| -> RoleSyncError {
        SourceError::RemoveFailed {
            path: root.to_path_buf(),
            message: format!("cannot read roles directory: {e}"),
        }
        .into()
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(read_failed)?;
    let mut dirs = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        let file_type = entry.file_type().await.map_err(read_failed)?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }

    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_source(root: &Path) -> PathBuf {
        let src = root.join("src-role");
        std::fs::create_dir_all(src.join("tasks")).expect("create tasks");
        std::fs::create_dir_all(src.join("defaults")).expect("create defaults");
        std::fs::write(src.join("tasks/main.yml"), "- name: hello\n").expect("write task");
        std::fs::write(src.join("defaults/main.yml"), "x: 1\n").expect("write defaults");
        src
    }

    #[tokio::test]
    async fn test_copy_tree() {
        let temp = TempDir::new().expect("temp dir");
        let src = make_source(temp.path());
        let dest = temp.path().join("roles/common");

        let stats = copy_tree("common", &src, &dest).await.expect("copy should succeed");

        assert_eq!(stats.files, 2);
        assert_eq!(stats.dirs, 3);
        assert_eq!(
            std::fs::read_to_string(dest.join("tasks/main.yml")).expect("read copied task"),
            "- name: hello\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_tree_keeps_symlinks() {
        let temp = TempDir::new().expect("temp dir");
        let src = make_source(temp.path());
        std::os::unix::fs::symlink("tasks/main.yml", src.join("link.yml")).expect("symlink");
        let dest = temp.path().join("copy");

        let stats = copy_tree("common", &src, &dest).await.expect("copy should succeed");

        assert_eq!(stats.links, 1);
        let link = std::fs::read_link(dest.join("link.yml")).expect("link copied");
        assert_eq!(link, PathBuf::from("tasks/main.yml"));
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let temp = TempDir::new().expect("temp dir");
        let result = copy_tree("common", &temp.path().join("nope"), &temp.path().join("d")).await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::LocalSourceMissing { .. }))
        ));
    }

    #[tokio::test]
    async fn test_copy_source_is_file() {
        let temp = TempDir::new().expect("temp dir");
        let file = temp.path().join("file");
        std::fs::write(&file, "x").expect("write file");

        let result = copy_tree("common", &file, &temp.path().join("d")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_copy_refuses_existing_dest() {
        let temp = TempDir::new().expect("temp dir");
        let src = make_source(temp.path());
        let dest = temp.path().join("dest");
        std::fs::create_dir_all(&dest).expect("create dest");

        let result = copy_tree("common", &src, &dest).await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::CopyFailed { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_copy_leaves_no_dest() {
        let temp = TempDir::new().expect("temp dir");
        let src = make_source(temp.path());
        let socket = src.join("zz.sock");
        let listener = std::os::unix::net::UnixListener::bind(&socket).expect("bind socket");
        let dest = temp.path().join("roles/common");

        let result = copy_tree("common", &src, &dest).await;
        assert!(matches!(
            result,
            Err(RoleSyncError::Source(SourceError::CopyFailed { .. }))
        ));
        assert!(!dest.exists());

        drop(listener);
        std::fs::remove_file(&socket).expect("remove socket");

        let stats = copy_tree("common", &src, &dest)
            .await
            .expect("copy after fixing the source should succeed");
        assert_eq!(stats.files, 2);
        assert!(dest.join("tasks/main.yml").exists());
    }

    #[tokio::test]
    async fn test_remove_tree() {
        let temp = TempDir::new().expect("temp dir");
        let src = make_source(temp.path());

        remove_tree(&src).await.expect("remove should succeed");
        assert!(!src.exists());

        remove_tree(&src).await.expect("removing twice is fine");
    }

    #[tokio::test]
    async fn test_list_subdirs_skips_files() {
        let temp = TempDir::new().expect("temp dir");
        std::fs::create_dir(temp.path().join("b")).expect("mkdir b");
        std::fs::create_dir(temp.path().join("a")).expect("mkdir a");
        std::fs::write(temp.path().join(".role-cache.json"), "{}").expect("write cache");

        let dirs = list_subdirs(temp.path()).await.expect("list should succeed");
        assert_eq!(dirs, vec![temp.path().join("a"), temp.path().join("b")]);

        assert!(list_subdirs(&temp.path().join("missing")).await.is_err());
    }
}
