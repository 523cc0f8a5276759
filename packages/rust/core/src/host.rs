//! The two narrow views of the host framework the hooks need.
//!
//! Node tagging only resolves nodes and writes fields; page emission only
//! queries the index and registers pages. [`Storage`] implements both so the
//! CLI can run the hooks against the local content index.

use async_trait::async_trait;

use stackpages_shared::{ContentNode, NodeQuery, PageDescriptor, Result};
use stackpages_storage::Storage;

/// Host capabilities available while a node is being created.
#[async_trait]
pub trait NodeCreationContext: Send + Sync {
    /// Look up a node by id.
    async fn resolve_node(&self, id: &str) -> Result<Option<ContentNode>>;

    /// Write a field onto a node.
    async fn register_field(&self, node_id: &str, name: &str, value: serde_json::Value)
    -> Result<()>;
}

/// Host capabilities available while pages are being created.
#[async_trait]
pub trait PageBuildContext: Send + Sync {
    /// Run a filter query against the content index.
    async fn query_index(&self, query: &NodeQuery) -> Result<Vec<ContentNode>>;

    /// Ask the host to materialize a page.
    async fn register_page(&self, page: PageDescriptor) -> Result<()>;
}

#[async_trait]
impl NodeCreationContext for Storage {
    async fn resolve_node(&self, id: &str) -> Result<Option<ContentNode>> {
        self.get_node(id).await
    }

    async fn register_field(
        &self,
        node_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        self.set_field(node_id, name, &value).await
    }
}

#[async_trait]
impl PageBuildContext for Storage {
    async fn query_index(&self, query: &NodeQuery) -> Result<Vec<ContentNode>> {
        self.query_nodes(query).await
    }

    async fn register_page(&self, page: PageDescriptor) -> Result<()> {
        self.insert_page(&page).await
    }
}
