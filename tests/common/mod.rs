//! Common test utilities and helpers for mimir-syncer tests
#![allow(dead_code)]

use futures::stream::{self, BoxStream, StreamExt};
use mimir_syncer::{Config, RemoteRepo, RepoProvider};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Whether a usable git binary is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking on failure, and return trimmed stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Mimir Test",
            "-c",
            "user.email=mimir@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare "remote" repository plus the working copy used to push to it
pub struct RemoteFixture {
    pub name: String,
    pub bare: PathBuf,
    pub work: PathBuf,
}

impl RemoteFixture {
    /// Create a remote with one commit per branch; `default` becomes its HEAD
    pub fn create(root: &Path, name: &str, branches: &[&str], default: &str) -> Self {
        let bare = root.join(format!("{}.git", name));
        let work = root.join(format!("{}-work", name));
        git(root, &["init", "--bare", &*bare.to_string_lossy()]);
        git(root, &["init", &*work.to_string_lossy()]);

        for (i, branch) in branches.iter().copied().enumerate() {
            if i == 0 {
                git(&work, &["symbolic-ref", "HEAD", format!("refs/heads/{}", branch).as_str()]);
            } else {
                git(&work, &["checkout", "-b", branch]);
            }
            std::fs::write(work.join(format!("{}.txt", branch)), branch).unwrap();
            git(&work, &["add", "."]);
            git(&work, &["commit", "-m", format!("add {}", branch).as_str()]);
        }

        git(&work, &["remote", "add", "origin", &*bare.to_string_lossy()]);
        git(&work, &["push", "origin", "--all"]);
        git(
            root,
            &[
                "--git-dir",
                &*bare.to_string_lossy(),
                "symbolic-ref",
                "HEAD",
                format!("refs/heads/{}", default).as_str(),
            ],
        );

        Self {
            name: name.to_string(),
            bare,
            work,
        }
    }

    /// Commit a change on `branch` and push it
    pub fn push_commit(&self, branch: &str, file: &str, content: &str) -> String {
        git(&self.work, &["checkout", branch]);
        std::fs::write(self.work.join(file), content).unwrap();
        git(&self.work, &["add", "."]);
        git(&self.work, &["commit", "-m", format!("update {}", file).as_str()]);
        git(&self.work, &["push", "origin", branch]);
        self.tip(branch)
    }

    /// Commit id of `branch` on the remote
    pub fn tip(&self, branch: &str) -> String {
        git(
            &self.work,
            &[
                "--git-dir",
                &*self.bare.to_string_lossy(),
                "rev-parse",
                format!("refs/heads/{}", branch).as_str(),
            ],
        )
    }

    pub fn remote_repo(&self) -> RemoteRepo {
        RemoteRepo {
            name: self.name.clone(),
            clone_url: format!("file://{}", self.bare.display()),
        }
    }
}

/// Checked-out branch and commit of a mirror
pub fn mirror_head(mirror: &Path) -> (String, String) {
    (
        git(mirror, &["rev-parse", "--abbrev-ref", "HEAD"]),
        git(mirror, &["rev-parse", "HEAD"]),
    )
}

/// Provider serving a fixed list of repositories
pub struct StaticProvider(pub Vec<RemoteRepo>);

impl RepoProvider for StaticProvider {
    fn get_repos(&self) -> BoxStream<'_, RemoteRepo> {
        stream::iter(self.0.clone()).boxed()
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

/// Configuration pointing at `repos_dir` with an unreachable indexer
pub fn test_config(repos_dir: &Path, priority: &[&str]) -> Config {
    let mut config = Config::default();
    config.provider.token = "token".to_string();
    config.provider.org = "acme".to_string();
    config.sync.repos_dir = repos_dir.to_string_lossy().into_owned();
    config.sync.branch_priority = priority.iter().map(|b| b.to_string()).collect();
    config.reindex.url = "http://127.0.0.1:9/reindex".to_string();
    config.reindex.timeout = 2;
    config
}

/// Minimal YAML config file content
pub fn config_yaml(repos_dir: &Path, extra: &str) -> String {
    format!(
        "sync:\n  repos_dir: \"{}\"\nreindex:\n  url: \"http://127.0.0.1:9/reindex\"\n  timeout: 2\n{}",
        repos_dir.display(),
        extra
    )
}
