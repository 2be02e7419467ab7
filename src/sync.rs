//! Sync Engine - Orchestrates a mirroring pass
//!
//! This module drives the clone-or-update sequence for every repository yielded
//! by a [`RepoProvider`], one repository at a time. Failures are isolated per
//! repository: a broken repository is recorded and the pass moves on.

use crate::command::{CommandRunner, SystemRunner};
use crate::discovery::{RemoteRepo, RepoProvider};
use crate::git::{BranchTarget, GitClient};
use crate::reindex::{NotifyOutcome, ReindexNotifier};
use crate::Config;
use anyhow::{anyhow, bail, Context, Result};
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Result of syncing one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Mirror did not exist and was cloned
    Cloned {
        name: String,
        path: PathBuf,
        branch: Option<BranchTarget>,
    },
    /// Existing mirror was fetched and realigned
    Updated {
        name: String,
        path: PathBuf,
        branch: Option<BranchTarget>,
        fetched: bool,
    },
    /// Repository could not be synced this pass
    Failed { name: String, error: String },
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncResult::Failed { .. })
    }
}

/// Results from a complete pass
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub synced: usize,
    pub cloned: usize,
    pub updated: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
    pub reindex: NotifyOutcome,
}

impl SyncSummary {
    fn compile(results: Vec<SyncResult>, duration: Duration, reindex: NotifyOutcome) -> Self {
        let mut cloned = 0;
        let mut updated = 0;
        let mut failed = 0;

        for result in &results {
            match result {
                SyncResult::Cloned { .. } => cloned += 1,
                SyncResult::Updated { .. } => updated += 1,
                SyncResult::Failed { .. } => failed += 1,
            }
        }

        Self {
            total_repositories: results.len(),
            synced: cloned + updated,
            cloned,
            updated,
            failed,
            duration,
            results,
            reindex,
        }
    }
}

/// Orchestrates mirroring passes
#[derive(Clone)]
pub struct SyncEngine {
    config: Arc<Config>,
    git_client: GitClient,
    notifier: ReindexNotifier,
}

impl SyncEngine {
    /// Create a sync engine running git as child processes
    pub fn new(config: Config) -> Result<Self> {
        Self::with_runner(config, Arc::new(SystemRunner::new()))
    }

    /// Create a sync engine on top of an arbitrary command runner
    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let notifier = ReindexNotifier::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            git_client: GitClient::new(runner),
            notifier,
        })
    }

    /// Run one pass over the provider feed, then trigger a reindex
    pub async fn sync_all(&self, provider: &dyn RepoProvider) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let repos_dir = self.config.repos_dir();

        info!("Starting sync process...");

        tokio::fs::create_dir_all(&repos_dir)
            .await
            .with_context(|| format!("Failed to create repos directory: {}", repos_dir.display()))?;

        let mut results = Vec::new();
        let mut repos = provider.get_repos();

        while let Some(repo) = repos.next().await {
            let outcome = AssertUnwindSafe(self.sync_repository(&repo))
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!("[{}] Error syncing repo: {:#}", repo.name, e);
                    SyncResult::Failed {
                        name: repo.name.clone(),
                        error: format!("{:#}", e),
                    }
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("[{}] Sync panicked: {}", repo.name, message);
                    SyncResult::Failed {
                        name: repo.name.clone(),
                        error: message,
                    }
                }
            };
            results.push(result);
        }
        drop(repos);

        let synced = results.iter().filter(|r| r.is_success()).count();
        info!("Sync process completed. Synced {} repositories.", synced);

        let reindex = self.notifier.notify().await;

        Ok(SyncSummary::compile(results, start_time.elapsed(), reindex))
    }

    /// Clone-or-update a single repository
    async fn sync_repository(&self, repo: &RemoteRepo) -> Result<SyncResult> {
        let dry_run = self.config.sync.dry_run;
        let path = self.mirror_path(&repo.name)?;
        let mut cloned = false;

        if !path.exists() {
            info!("[{}] Cloning...", repo.name);
            if !self
                .git_client
                .clone_repository(&repo.clone_url, &path, dry_run)
                .await
            {
                bail!("clone failed");
            }
            cloned = true;
        }

        info!("[{}] Updating...", repo.name);
        let fetched = self.git_client.fetch_all(&path, dry_run).await;
        if !fetched {
            warn!("[{}] Fetch failed, trying to proceed with cached refs.", repo.name);
        }

        let branch = if dry_run {
            None
        } else {
            Some(
                self.git_client
                    .resolve_and_checkout(&path, &repo.name, &self.config.sync.branch_priority)
                    .await?,
            )
        };

        let name = repo.name.clone();
        Ok(if cloned {
            SyncResult::Cloned { name, path, branch }
        } else {
            SyncResult::Updated {
                name,
                path,
                branch,
                fetched,
            }
        })
    }

    /// Local mirror location for a repository name
    pub fn mirror_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.config.repos_dir().join(name)),
            _ => Err(anyhow!("Invalid repository name for a mirror directory: {:?}", name)),
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
