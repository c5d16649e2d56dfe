//! Thin wrapper around the `git` executable.
//!
//! qobs needs three operations: a (possibly shallow, single branch) clone,
//! a fast-forward pull and a forced checkout of a revision. All of them stream
//! git's own progress to the terminal.

mod error;

pub use error::{GitError, GitErrorExt};

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Options for [`Git::clone_repo`].
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Branch to check out; also limits the clone to that branch.
    pub branch: Option<String>,
    /// History depth. `None` clones the full history.
    pub depth: Option<u32>,
    /// Initialize and update submodules recursively.
    pub recurse_submodules: bool,
}

impl CloneOptions {
    /// A depth-one clone of a single branch.
    #[must_use]
    pub fn shallow(branch: impl Into<String>) -> Self {
        Self { branch: Some(branch.into()), depth: Some(1), recurse_submodules: false }
    }
}

#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
}

impl Default for Git {
    fn default() -> Self {
        Self { program: PathBuf::from("git") }
    }
}

impl Git {
    /// Creates a helper that runs `git` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific git binary (useful for testing/custom setups).
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Clones `url` into `dest`.
    ///
    /// # Errors
    /// Returns an error if git cannot be spawned or the clone fails.
    pub fn clone_repo(&self, url: &str, dest: &Path, options: &CloneOptions) -> Result<(), GitError> {
        let mut cmd = self.command();
        cmd.arg("clone");
        if let Some(depth) = options.depth {
            cmd.arg("--depth").arg(depth.to_string());
        }
        if let Some(branch) = &options.branch {
            cmd.args(["--branch", branch, "--single-branch"]);
        }
        if options.recurse_submodules {
            cmd.arg("--recurse-submodules");
        }
        cmd.arg("--").arg(url).arg(dest);
        self.run(cmd)
    }

    /// Pulls `branch` from `origin` into the repository at `dir`.
    ///
    /// An already up-to-date repository is not an error.
    ///
    /// # Errors
    /// Returns an error if git cannot be spawned or the pull fails.
    pub fn pull(&self, dir: &Path, branch: &str, depth: Option<u32>) -> Result<(), GitError> {
        let mut cmd = self.command();
        cmd.arg("-C").arg(dir).args(["pull", "--ff-only"]);
        if let Some(depth) = depth {
            cmd.arg("--depth").arg(depth.to_string());
        }
        cmd.args(["origin", branch]);
        self.run(cmd)
    }

    /// Force-checks out `revision` (commit, tag or branch) in `dir`.
    ///
    /// # Errors
    /// Returns an error if git cannot be spawned or the revision does not resolve.
    pub fn checkout(&self, dir: &Path, revision: &str) -> Result<(), GitError> {
        let mut cmd = self.command();
        cmd.arg("-C").arg(dir).args(["checkout", "--force", "--quiet", revision]);
        self.run(cmd)?;

        if dir.join(".gitmodules").exists() {
            let mut cmd = self.command();
            cmd.arg("-C").arg(dir).args(["submodule", "update", "--init", "--recursive"]);
            self.run(cmd)?;
        }
        Ok(())
    }

    /// Returns `true` if `dir` is the root of a git work tree.
    #[must_use]
    pub fn is_repository(dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<(), GitError> {
        let rendered = render(&cmd);
        debug!("running {rendered}");

        let status = cmd.status().map_err(|source| GitError::Spawn {
            source,
            context: Some(
                format!("Failed to execute {}. Is git installed and in your PATH?", self.program.display())
                    .into(),
            ),
        })?;

        if !status.success() {
            return Err(GitError::CommandFailed {
                command: rendered.into(),
                code: status.code(),
                context: None,
            });
        }
        Ok(())
    }
}

fn render(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_joins_program_and_args() {
        let mut cmd = Command::new("git");
        cmd.args(["clone", "--depth", "1"]);
        assert_eq!(render(&cmd), "git clone --depth 1");
    }

    #[test]
    fn test_shallow_options() {
        let options = CloneOptions::shallow("main");
        assert_eq!(options.branch.as_deref(), Some("main"));
        assert_eq!(options.depth, Some(1));
        assert!(!options.recurse_submodules);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let git = Git::with_program("definitely-not-a-real-git-binary");
        let tmp = tempfile::tempdir().unwrap();
        let err = git.checkout(tmp.path(), "main").unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }));
    }
}
