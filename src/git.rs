use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;

/// Git operations on local mirrors
#[derive(Clone)]
pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
}

/// Branch a mirror was aligned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchTarget {
    /// First entry of the priority list present on the remote
    Priority(String),
    /// The remote's default branch (`origin/HEAD`)
    RemoteDefault,
}

impl std::fmt::Display for BranchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchTarget::Priority(branch) => write!(f, "{}", branch),
            BranchTarget::RemoteDefault => write!(f, "origin/HEAD"),
        }
    }
}

impl GitClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Clone `url` into `target`
    pub async fn clone_repository(&self, url: &str, target: &Path, dry_run: bool) -> bool {
        let target = target.to_string_lossy().into_owned();
        self.runner
            .run(&["git", "clone", url, target.as_str()], None, dry_run)
            .await
    }

    /// Fetch all remotes of the mirror at `path`
    pub async fn fetch_all(&self, path: &Path, dry_run: bool) -> bool {
        self.runner
            .run(&["git", "fetch", "--all"], Some(path), dry_run)
            .await
    }

    /// Remote branch names of the mirror at `path`, `origin/` prefix removed.
    ///
    /// Any execution error yields an empty list.
    pub async fn list_remote_branches(&self, path: &Path) -> Vec<String> {
        match self.runner.output(&["git", "branch", "-r"], Some(path)).await {
            Ok(stdout) => parse_remote_branches(&stdout),
            Err(e) => {
                debug!("Could not list remote branches in {}: {:#}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Check out the highest-priority branch available on the remote, or reset
    /// to the remote default when none matches.
    ///
    /// The two priority steps are best-effort. A failed reset to `origin/HEAD`
    /// means the remote has no usable default and is reported as an error.
    pub async fn resolve_and_checkout(
        &self,
        path: &Path,
        name: &str,
        priority: &[String],
    ) -> Result<BranchTarget> {
        let remote_branches = self.list_remote_branches(path).await;
        debug!("[{}] Available remote branches: {:?}", name, remote_branches);
        debug!("[{}] Priority list: {:?}", name, priority);

        match select_branch(priority, &remote_branches) {
            Some(branch) => {
                info!("[{}] Found priority branch: {}", name, branch);
                let upstream = format!("origin/{}", branch);

                if !self
                    .runner
                    .run(&["git", "checkout", "-B", branch, upstream.as_str()], Some(path), false)
                    .await
                {
                    warn!("[{}] Checkout of {} failed", name, branch);
                }
                if !self
                    .runner
                    .run(&["git", "reset", "--hard", upstream.as_str()], Some(path), false)
                    .await
                {
                    warn!("[{}] Reset to {} failed", name, upstream);
                }

                Ok(BranchTarget::Priority(branch.to_string()))
            }
            None => {
                info!(
                    "[{}] No priority branch found/configured. Using default branch (origin/HEAD).",
                    name
                );
                if self
                    .runner
                    .run(&["git", "reset", "--hard", "origin/HEAD"], Some(path), false)
                    .await
                {
                    Ok(BranchTarget::RemoteDefault)
                } else {
                    Err(anyhow!("remote has no default branch (origin/HEAD)"))
                }
            }
        }
    }
}

/// Parse `git branch -r` output into bare branch names
pub fn parse_remote_branches(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.contains("->"))
        .filter_map(|line| line.strip_prefix("origin/"))
        .map(String::from)
        .collect()
}

/// First priority entry present among `remote_branches`
pub fn select_branch<'a>(priority: &'a [String], remote_branches: &[String]) -> Option<&'a str> {
    priority
        .iter()
        .find(|candidate| remote_branches.contains(*candidate))
        .map(String::as_str)
}
