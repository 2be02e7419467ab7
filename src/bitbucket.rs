use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::discovery::{api_client, inject_credentials, RemoteRepo, RepoProvider};

/// Lists the repositories of a Bitbucket workspace, following the opaque
/// `next` link of each response page
pub struct BitbucketProvider {
    client: reqwest::Client,
    first_page: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    values: Vec<ApiRepo>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    clone: Vec<CloneLink>,
}

#[derive(Debug, Deserialize)]
struct CloneLink {
    name: String,
    href: String,
}

/// Basic-auth credentials from a `username:app_password` token, falling back
/// to the workspace name as username
fn split_credentials(token: &str, workspace: &str) -> (String, String, bool) {
    match token.split_once(':') {
        Some((user, password)) => (user.to_string(), password.to_string(), false),
        None => (workspace.to_string(), token.to_string(), true),
    }
}

impl BitbucketProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let (username, password, fallback) =
            split_credentials(&config.provider.token, &config.provider.org);
        if fallback {
            warn!("Bitbucket API_TOKEN should be format 'username:app_password' for best results.");
        }

        let first_page = format!(
            "{}/repositories/{}?pagelen=100",
            config.provider.bitbucket_api_url.trim_end_matches('/'),
            config.provider.org
        );

        Ok(Self {
            client: api_client()?,
            first_page,
            username,
            password,
        })
    }

    /// Fetch one page. `None` ends the feed.
    async fn fetch_page(&self, url: String) -> Option<(Vec<RemoteRepo>, Option<String>)> {
        debug!("Fetching Bitbucket repositories from {}", url);

        let response = match self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch repos from Bitbucket: {}", e);
                return None;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to fetch repos from Bitbucket: {} {}", status, body);
            return None;
        }

        let page: Page = match response.json().await {
            Ok(page) => page,
            Err(e) => {
                error!("Failed to parse Bitbucket repository page: {}", e);
                return None;
            }
        };

        let repos = page
            .values
            .into_iter()
            .filter_map(|repo| self.to_remote(repo))
            .collect();

        Some((repos, page.next))
    }

    fn to_remote(&self, repo: ApiRepo) -> Option<RemoteRepo> {
        let link = repo.links.clone.iter().find(|link| link.name == "https")?;

        match inject_credentials(&link.href, &self.username, Some(&self.password)) {
            Ok(clone_url) => Some(RemoteRepo {
                name: repo.name,
                clone_url,
            }),
            Err(e) => {
                warn!("[{}] Skipping repository: {}", repo.name, e);
                None
            }
        }
    }
}

impl RepoProvider for BitbucketProvider {
    fn get_repos(&self) -> BoxStream<'_, RemoteRepo> {
        stream::unfold(Some(self.first_page.clone()), move |next| async move {
            let url = next?;
            let (repos, next) = self.fetch_page(url).await?;
            Some((repos, next))
        })
        .flat_map(stream::iter)
        .boxed()
    }

    fn provider_name(&self) -> &'static str {
        "Bitbucket"
    }
}
