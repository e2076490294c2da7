//! Thin async wrapper around the `git` command-line client.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{Result, RoleSyncError, SourceError};

/// Exit code of `git ls-remote --exit-code` when no matching ref exists.
const LS_REMOTE_NO_MATCH: i32 = 2;

/// Runs git subcommands for a single role.
#[derive(Debug, Clone)]
pub struct GitCli {
    /// Executable to run.
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Creates a client using `git` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: String::from("git"),
        }
    }

    /// Creates a client using a specific executable.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks that `qualified_ref` exists on the remote at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::RefNotFound`] when the remote answers but has no
    /// such ref, or a git error when the remote cannot be reached.
    pub async fn ls_remote(&self, role: &str, url: &str, qualified_ref: &str) -> Result<()> {
        let output = self
            .output(
                role,
                "ls-remote",
                None,
                ["ls-remote", "--exit-code", url, qualified_ref],
            )
            .await?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(LS_REMOTE_NO_MATCH) => Err(SourceError::RefNotFound {
                location: url.to_string(),
                reference: qualified_ref.to_string(),
            }
            .into()),
            _ => Err(failure(role, "ls-remote", &output)),
        }
    }

    /// Clones a single branch or tag at depth 1 into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the clone fails.
    pub async fn clone_shallow(
        &self,
        role: &str,
        url: &str,
        reference: &str,
        dest: &Path,
    ) -> Result<()> {
        let mut args: Vec<&OsStr> = [
            "clone",
            "--quiet",
            "--depth",
            "1",
            "--single-branch",
            "--branch",
            reference,
            url,
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();
        args.push(dest.as_os_str());

        self.run(role, "clone", None, args).await
    }

    /// Fast-forwards the working tree to the remote `reference`.
    ///
    /// An up-to-date tree is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails or cannot fast-forward.
    pub async fn pull_ff_only(&self, role: &str, dir: &Path, reference: &str) -> Result<()> {
        self.run(
            role,
            "pull",
            Some(dir),
            ["pull", "--quiet", "--ff-only", "origin", reference],
        )
        .await
    }

    /// Fetches `refspec` from `origin` at depth 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn fetch(&self, role: &str, dir: &Path, refspec: &str) -> Result<()> {
        self.run(
            role,
            "fetch",
            Some(dir),
            ["fetch", "--quiet", "--depth", "1", "origin", refspec],
        )
        .await
    }

    /// Points a local branch at the fetched remote branch and checks it out.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkout fails.
    pub async fn checkout_branch(&self, role: &str, dir: &Path, branch: &str) -> Result<()> {
        let start = format!("refs/remotes/origin/{branch}");
        self.run(
            role,
            "checkout",
            Some(dir),
            ["checkout", "--quiet", "-B", branch, start.as_str()],
        )
        .await
    }

    /// Checks out a fetched tag on a detached HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkout fails.
    pub async fn checkout_tag(&self, role: &str, dir: &Path, tag: &str) -> Result<()> {
        let target = format!("refs/tags/{tag}");
        self.run(
            role,
            "checkout",
            Some(dir),
            ["checkout", "--quiet", "--detach", target.as_str()],
        )
        .await
    }

    /// Runs a git command and turns a non-zero exit into an error.
    async fn run<I, S>(&self, role: &str, operation: &str, dir: Option<&Path>, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(role, operation, dir, args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(failure(role, operation, &output))
        }
    }

    /// Runs a git command and returns its raw output.
    async fn output<I, S>(
        &self,
        role: &str,
        operation: &str,
        dir: Option<&Path>,
        args: I,
    ) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        debug!(role, operation, "Running git");
        let output = command.output().await.map_err(|e| -> RoleSyncError {
            if e.kind() == ErrorKind::NotFound {
                SourceError::GitUnavailable {
                    message: format!("'{}' not found in PATH", self.program),
                }
                .into()
            } else {
                SourceError::git(role, operation, format!("failed to start git: {e}")).into()
            }
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!(role, operation, status = %output.status, stderr = %stderr.trim(), "git finished");
        Ok(output)
    }
}

fn failure(role: &str, operation: &str, output: &Output) -> RoleSyncError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = match stderr.trim() {
        "" => format!("exited with {}", output.status),
        text => text.to_string(),
    };
    SourceError::git(role, operation, message).into()
}
