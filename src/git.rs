//! # Git Subprocess Calls
//!
//! Marketplaces are plain git checkouts. Everything here shells out to the
//! system `git`, which picks up SSH keys, credential helpers and whatever
//! else the user has configured in `~/.gitconfig`.
//!
//! [`GitOperations`] is the seam the marketplace manager talks to, so tests
//! can swap in a mock that never touches the network.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use log::debug;

use crate::error::{Error, Result};

/// Git operations the marketplace manager needs.
pub trait GitOperations: Send + Sync {
    /// Shallow clone `url` into `target_dir`. The directory must not exist.
    fn clone_shallow(&self, url: &str, target_dir: &Path) -> Result<()>;

    /// Fast-forward the checkout at `repo_dir` to its upstream.
    fn pull_ff_only(&self, repo_dir: &Path) -> Result<String>;
}

/// Runs the system `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemGit;

impl GitOperations for SystemGit {
    fn clone_shallow(&self, url: &str, target_dir: &Path) -> Result<()> {
        clone_shallow(url, target_dir)
    }

    fn pull_ff_only(&self, repo_dir: &Path) -> Result<String> {
        pull_ff_only(repo_dir)
    }
}

/// `git clone --depth 1 <url> <target_dir>`
pub fn clone_shallow(url: &str, target_dir: &Path) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut command = Command::new("git");
    command.args(["clone", "--depth", "1", url]).arg(target_dir);
    run(command, "git clone --depth 1", url)?;
    Ok(())
}

/// `git pull --ff-only`, run inside `repo_dir`. Returns git's stdout.
pub fn pull_ff_only(repo_dir: &Path) -> Result<String> {
    let mut command = Command::new("git");
    command.args(["pull", "--ff-only"]).current_dir(repo_dir);
    let output = run(command, "git pull --ff-only", &repo_dir.display().to_string())?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// True if `dir` holds a completed checkout rather than a leftover from an
/// interrupted clone.
pub fn is_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

fn run(mut command: Command, label: &str, target: &str) -> Result<Output> {
    debug!("Running {} for {}", label, target);
    let output = command.output().map_err(|e| Error::Subprocess {
        command: label.to_string(),
        target: target.to_string(),
        stderr: e.to_string(),
        hint: Some("Make sure git is installed and on your PATH".to_string()),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let hint = failure_hint(&stderr);
        return Err(Error::Subprocess {
            command: label.to_string(),
            target: target.to_string(),
            stderr,
            hint,
        });
    }
    Ok(output)
}

fn failure_hint(stderr: &str) -> Option<String> {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        Some(
            "Authentication failed. For private repositories make sure an SSH key \
             is loaded in ssh-agent or git credentials are configured"
                .to_string(),
        )
    } else if stderr.contains("Not possible to fast-forward") {
        Some("Local changes diverge from upstream; resolve them inside the marketplace directory".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_checkout() {
        let temp = TempDir::new().unwrap();
        assert!(!is_checkout(temp.path()));
        fs::create_dir(temp.path().join(".git")).unwrap();
        assert!(is_checkout(temp.path()));
    }

    #[test]
    fn test_failure_hint_for_auth_errors() {
        let hint = failure_hint("fatal: Could not read from remote repository.").unwrap();
        assert!(hint.contains("Authentication failed"));
        assert!(failure_hint("fatal: Not possible to fast-forward, aborting.").is_some());
        assert!(failure_hint("fatal: something else").is_none());
    }

    #[test]
    fn test_pull_outside_a_repository_fails() {
        let temp = TempDir::new().unwrap();
        let result = pull_ff_only(temp.path());
        assert!(matches!(result, Err(Error::Subprocess { .. })));
    }

    #[test]
    #[cfg(feature = "integration-tests")]
    fn test_clone_shallow_real_repository() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("repo");
        clone_shallow("https://github.com/anthropics/skills.git", &target).unwrap();
        assert!(is_checkout(&target));
        pull_ff_only(&target).unwrap();
    }
}
