//! GitHub repository lookup via the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use stackpages_shared::{LookupsConfig, Result, VcsMetadata};

use crate::{LookupError, VcsLookup, build_client, endpoint};

/// Media type GitHub recommends for REST requests.
const ACCEPT: &str = "application/vnd.github+json";

/// VCS lookup backed by `GET /repos/{owner}/{name}`.
pub struct GitHubClient {
    client: Client,
    api: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api,
            token,
        })
    }

    /// Build from the `[lookups]` config section, reading the token from its env var.
    pub fn from_config(config: &LookupsConfig) -> Result<Self> {
        Self::new(
            config.github_api()?,
            config.github_token(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

/// Subset of the repository payload we keep.
#[derive(Debug, Deserialize)]
struct RepoResponse {
    full_name: String,
    description: Option<String>,
    homepage: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    license: Option<LicenseResponse>,
    #[serde(default)]
    topics: Vec<String>,
    pushed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseResponse {
    spdx_id: Option<String>,
}

impl From<RepoResponse> for VcsMetadata {
    fn from(repo: RepoResponse) -> Self {
        Self {
            full_name: repo.full_name,
            description: repo.description.filter(|d| !d.is_empty()),
            homepage: repo.homepage.filter(|h| !h.is_empty()),
            html_url: repo.html_url,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            open_issues: repo.open_issues_count,
            license: repo.license.and_then(|l| l.spdx_id),
            topics: repo.topics,
            pushed_at: repo.pushed_at,
        }
    }
}

#[async_trait]
impl VcsLookup for GitHubClient {
    async fn lookup(&self, owner: &str, name: &str) -> std::result::Result<VcsMetadata, LookupError> {
        if owner.is_empty() || name.is_empty() || owner.contains(':') {
            return Err(LookupError::InvalidReference(format!("{owner}/{name}")));
        }

        let url = endpoint(&self.api, &format!("repos/{owner}/{name}"));
        debug!(%url, "fetching repository metadata");

        let mut request = self.client.get(&url).header(reqwest::header::ACCEPT, ACCEPT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Network(format!("{url}: {e}")))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(LookupError::NotFound(format!("{owner}/{name}"))),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                return Err(LookupError::RateLimited(url));
            }
            s => {
                return Err(LookupError::Status {
                    url,
                    status: s.as_u16(),
                });
            }
        }

        let repo: RepoResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(format!("{url}: {e}")))?;

        Ok(repo.into())
    }

    fn source(&self) -> &str {
        "github"
    }
}
