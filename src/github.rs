use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::discovery::{api_client, inject_credentials, RemoteRepo, RepoProvider};

const PER_PAGE: u32 = 100;

/// Lists the repositories of a GitHub organization, falling back to the user
/// endpoint when no organization by that name exists
pub struct GitHubProvider {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    token: String,
}

/// Which listing endpoint pagination continues against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Org,
    User,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    clone_url: String,
}

impl GitHubProvider {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: api_client()?,
            api_url: config.provider.github_api_url.trim_end_matches('/').to_string(),
            owner: config.provider.org.clone(),
            token: config.provider.token.clone(),
        })
    }

    fn page_url(&self, endpoint: Endpoint, page: u32) -> String {
        let scope = match endpoint {
            Endpoint::Org => "orgs",
            Endpoint::User => "users",
        };
        format!(
            "{}/{}/{}/repos?type=all&per_page={}&page={}",
            self.api_url, scope, self.owner, PER_PAGE, page
        )
    }

    async fn request(&self, endpoint: Endpoint, page: u32) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(self.page_url(endpoint, page))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
    }

    /// Fetch one page. `None` ends the feed.
    async fn fetch_page(&self, endpoint: Endpoint, page: u32) -> Option<(Endpoint, Vec<RemoteRepo>)> {
        debug!("Fetching GitHub repositories page {} for {}", page, self.owner);

        let mut endpoint = endpoint;
        let mut response = match self.request(endpoint, page).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch repos from GitHub: {}", e);
                return None;
            }
        };

        if response.status() == StatusCode::NOT_FOUND && page == 1 && endpoint == Endpoint::Org {
            info!("Organization '{}' not found, trying as user...", self.owner);
            endpoint = Endpoint::User;
            response = match self.request(endpoint, page).await {
                Ok(response) => response,
                Err(e) => {
                    error!("Failed to fetch repos from GitHub: {}", e);
                    return None;
                }
            };
        }

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to fetch repos from GitHub: {} {}", status, body);
            return None;
        }

        let repos: Vec<ApiRepo> = match response.json().await {
            Ok(repos) => repos,
            Err(e) => {
                error!("Failed to parse GitHub repository page {}: {}", page, e);
                return None;
            }
        };

        if repos.is_empty() {
            return None;
        }

        let repos = repos
            .into_iter()
            .filter_map(|repo| match inject_credentials(&repo.clone_url, &self.token, None) {
                Ok(clone_url) => Some(RemoteRepo {
                    name: repo.name,
                    clone_url,
                }),
                Err(e) => {
                    warn!("[{}] Skipping repository: {}", repo.name, e);
                    None
                }
            })
            .collect();

        Some((endpoint, repos))
    }
}

impl RepoProvider for GitHubProvider {
    fn get_repos(&self) -> BoxStream<'_, RemoteRepo> {
        stream::unfold(Some((Endpoint::Org, 1u32)), move |state| async move {
            let (endpoint, page) = state?;
            let (endpoint, repos) = self.fetch_page(endpoint, page).await?;
            Some((repos, Some((endpoint, page + 1))))
        })
        .flat_map(stream::iter)
        .boxed()
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GitHubProvider {
        let mut config = Config::default();
        config.provider.token = "ghp_secret".to_string();
        config.provider.org = "acme".to_string();
        config.provider.github_api_url = server.uri();
        GitHubProvider::new(&config).unwrap()
    }

    fn repo_json(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "full_name": format!("acme/{}", name),
            "clone_url": format!("https://github.com/acme/{}.git", name),
        })
    }

    async fn collect(provider: &GitHubProvider) -> Vec<RemoteRepo> {
        provider.get_repos().collect().await
    }

    #[tokio::test]
    async fn test_paginates_until_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .and(header("authorization", "Bearer ghp_secret"))
            .and(header("accept", "application/vnd.github+json"))
            .and(header(
                "user-agent",
                concat!("mimir-syncer/", env!("CARGO_PKG_VERSION")),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("a"), repo_json("b")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("c")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = collect(&provider_for(&server)).await;

        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(repos[0].clone_url, "https://ghp_secret@github.com/acme/a.git");
    }

    #[tokio::test]
    async fn test_falls_back_to_user_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("a"), repo_json("b")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = collect(&provider_for(&server)).await;

        assert_eq!(
            repos,
            vec![
                RemoteRepo {
                    name: "a".to_string(),
                    clone_url: "https://ghp_secret@github.com/acme/a.git".to_string(),
                },
                RemoteRepo {
                    name: "b".to_string(),
                    clone_url: "https://ghp_secret@github.com/acme/b.git".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_on_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("a")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let repos = collect(&provider_for(&server)).await;
        assert_eq!(repos.len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_after_first_page_stops() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("a")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/acme/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("z")])))
            .expect(0)
            .mount(&server)
            .await;

        let repos = collect(&provider_for(&server)).await;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "a");
    }

    #[tokio::test]
    async fn test_empty_first_page_is_empty_feed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        assert!(collect(&provider_for(&server)).await.is_empty());
    }

    #[tokio::test]
    async fn test_feed_is_lazy() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("a")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo_json("b")])))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let first = provider.get_repos().next().await.unwrap();
        assert_eq!(first.name, "a");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_empty_feed() {
        let mut config = Config::default();
        config.provider.token = "t".to_string();
        config.provider.org = "acme".to_string();
        config.provider.github_api_url = "http://127.0.0.1:9".to_string();
        let provider = GitHubProvider::new(&config).unwrap();

        assert!(collect(&provider).await.is_empty());
    }
}
