//! External metadata lookups for stack tools.
//!
//! Two independent sources are consulted for every tool:
//! - [`VcsLookup`] resolves a repository `owner/name` pair (GitHub)
//! - [`CatalogLookup`] resolves a catalog slug (StackShare)
//!
//! Both are fallible per call; callers decide what a failure means. The
//! [`refs`] module turns a tool's reference URLs into lookup arguments.

pub mod github;
pub mod refs;
pub mod stackshare;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use stackpages_shared::{CatalogMetadata, StackPagesError, VcsMetadata};

pub use github::GitHubClient;
pub use refs::{catalog_ref, vcs_ref};
pub use stackshare::StackShareClient;

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("stackpages/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow for a lookup.
const MAX_REDIRECTS: usize = 3;

// ---------------------------------------------------------------------------
// LookupError
// ---------------------------------------------------------------------------

/// Why a single metadata lookup failed.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The lookup arguments cannot name anything (e.g. empty owner).
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Transport-level failure (DNS, connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The service does not know the requested item.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service refused the request because of rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status.
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// The service answered but reported errors in its payload.
    #[error("api error: {0}")]
    Api(String),

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Lookup traits
// ---------------------------------------------------------------------------

/// Repository metadata source.
#[async_trait]
pub trait VcsLookup: Send + Sync {
    async fn lookup(&self, owner: &str, name: &str) -> Result<VcsMetadata, LookupError>;

    /// Short source name for logs.
    fn source(&self) -> &str;
}

/// Tool catalog metadata source.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Look up a tool by catalog slug. `url` is the catalog page the slug came from.
    async fn lookup(&self, name: &str, url: &str) -> Result<CatalogMetadata, LookupError>;

    /// Short source name for logs.
    fn source(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
pub(crate) fn build_client(timeout: Duration) -> stackpages_shared::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| StackPagesError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join a path onto an API base URL, tolerating a trailing slash on the base.
pub(crate) fn endpoint(base: &url::Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}
