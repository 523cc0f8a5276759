//! StackShare tool lookup via the GraphQL API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use stackpages_shared::{CatalogMetadata, LookupsConfig, Result};

use crate::{CatalogLookup, LookupError, build_client, endpoint};

const TOOL_QUERY: &str = r#"query Tool($id: ID!) {
  tool(id: $id) {
    name
    slug
    title
    description
    imageUrl
    websiteUrl
    followersCount
    stacksCount
  }
}"#;

/// Catalog lookup backed by the StackShare `tool` query.
pub struct StackShareClient {
    client: Client,
    api: Url,
    token: Option<String>,
}

impl StackShareClient {
    pub fn new(api: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api,
            token,
        })
    }

    /// Build from the `[lookups]` config section, reading the API key from its env var.
    pub fn from_config(config: &LookupsConfig) -> Result<Self> {
        Self::new(
            config.stackshare_api()?,
            config.stackshare_token(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ToolData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ToolData {
    tool: Option<ToolResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResponse {
    name: String,
    slug: String,
    title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    website_url: Option<String>,
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    stacks_count: u64,
}

impl ToolResponse {
    fn into_metadata(self, canonical_url: &str) -> CatalogMetadata {
        CatalogMetadata {
            name: self.name,
            slug: self.slug,
            title: self.title,
            description: self.description,
            image_url: self.image_url,
            website_url: self.website_url,
            followers_count: self.followers_count,
            stacks_count: self.stacks_count,
            canonical_url: canonical_url.to_string(),
        }
    }
}

#[async_trait]
impl CatalogLookup for StackShareClient {
    async fn lookup(&self, name: &str, url: &str) -> std::result::Result<CatalogMetadata, LookupError> {
        if name.is_empty() || name.contains("://") {
            return Err(LookupError::InvalidReference(url.to_string()));
        }

        let api_url = endpoint(&self.api, "graphql");
        debug!(%api_url, tool = name, "fetching catalog metadata");

        let body = serde_json::json!({
            "query": TOOL_QUERY,
            "variables": { "id": name },
        });

        let mut request = self.client.post(&api_url).json(&body);
        if let Some(token) = &self.token {
            request = request.header("x-api-key", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Network(format!("{api_url}: {e}")))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(LookupError::RateLimited(api_url)),
            s => {
                return Err(LookupError::Status {
                    url: api_url,
                    status: s.as_u16(),
                });
            }
        }

        let payload: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(format!("{api_url}: {e}")))?;

        if !payload.errors.is_empty() {
            let messages: Vec<_> = payload.errors.into_iter().map(|e| e.message).collect();
            return Err(LookupError::Api(messages.join("; ")));
        }

        payload
            .data
            .and_then(|d| d.tool)
            .map(|tool| tool.into_metadata(url))
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    fn source(&self) -> &str {
        "stackshare"
    }
}
