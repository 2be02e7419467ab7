//! Repository discovery abstraction layer
//!
//! This module provides a provider-agnostic interface for listing the repositories
//! of an organization or workspace. Each provider turns its own paginated REST API
//! into a lazy stream of [`RemoteRepo`] values.

use anyhow::{Context, Result};
use futures::stream::BoxStream;
use reqwest::Url;
use std::time::Duration;

use crate::bitbucket::BitbucketProvider;
use crate::config::{Config, ProviderKind};
use crate::github::GitHubProvider;

/// A repository to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    /// Repository name, also the mirror directory name
    pub name: String,

    /// Clone URL with credentials embedded
    pub clone_url: String,
}

/// Source of repositories to mirror.
///
/// Implementations must not fail on empty results: an empty stream is a valid
/// feed. HTTP failures are logged and end the stream early.
pub trait RepoProvider: Send + Sync {
    /// Lazily list repositories, fetching pages as the stream is polled
    fn get_repos(&self) -> BoxStream<'_, RemoteRepo>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Build the provider selected by `config.provider.kind`
pub fn create_provider(config: &Config) -> Result<Box<dyn RepoProvider>> {
    let provider: Box<dyn RepoProvider> = match config.provider_kind()? {
        ProviderKind::GitHub => Box::new(GitHubProvider::new(config)?),
        ProviderKind::Bitbucket => Box::new(BitbucketProvider::new(config)?),
    };
    Ok(provider)
}

/// Shared HTTP client for provider API calls
pub(crate) fn api_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("mimir-syncer/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}

/// Embed credentials in a clone URL, replacing any userinfo already present
pub fn inject_credentials(clone_url: &str, username: &str, password: Option<&str>) -> Result<String> {
    let mut url = Url::parse(clone_url)
        .with_context(|| format!("Invalid clone URL: {}", clone_url))?;

    url.set_username(username)
        .map_err(|_| anyhow::anyhow!("Clone URL cannot carry credentials: {}", clone_url))?;
    url.set_password(password)
        .map_err(|_| anyhow::anyhow!("Clone URL cannot carry credentials: {}", clone_url))?;

    Ok(url.to_string())
}
