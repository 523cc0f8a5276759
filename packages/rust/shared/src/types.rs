//! Core domain types: stacks, tools, their looked-up metadata, content nodes
//! and page descriptors.
//!
//! Everything that ends up in a node's field store serializes in camelCase so
//! the page component sees the same shape the site's queries ask for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackPagesError};

/// Internal type of markdown content nodes.
pub const MARKDOWN_REMARK: &str = "MarkdownRemark";

/// Internal type of file nodes (parents of markdown nodes).
pub const FILE_NODE: &str = "File";

/// Field holding the source instance name copied from the parent file.
pub const FIELD_SOURCE_NAME: &str = "sourceName";

/// Field holding the enriched stacks.
pub const FIELD_STACKS: &str = "stacks";

// ---------------------------------------------------------------------------
// Stack / Tool
// ---------------------------------------------------------------------------

/// A named grouping of tools representing a technology approach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    /// Display name, e.g. "The JAMStack".
    pub name: String,
    /// Routing slug, unique across the catalog.
    pub path: String,
    /// Grouping label.
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

/// A reference link to an external metadata source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RefLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// The URL, treating an empty string as absent.
    pub fn as_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

/// An individual piece of software referenced by a [`Stack`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// Canonical homepage, informational only.
    pub url: String,
    /// Repository link used for the VCS lookup.
    #[serde(default)]
    pub git_hub: RefLink,
    /// Catalog link used for the StackShare lookup.
    #[serde(default)]
    pub stack_share: RefLink,
    /// Filled in by enrichment when the VCS lookup succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_hub_data: Option<VcsMetadata>,
    /// Filled in by enrichment when the catalog lookup succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_share_data: Option<CatalogMetadata>,
}

// ---------------------------------------------------------------------------
// Looked-up metadata
// ---------------------------------------------------------------------------

/// Repository metadata returned by the VCS lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcsMetadata {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub open_issues: u64,
    /// SPDX identifier of the repository license.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<String>,
}

/// Tool metadata returned by the catalog (StackShare) lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub stacks_count: u64,
    /// The catalog page the lookup was made for.
    pub canonical_url: String,
}

// ---------------------------------------------------------------------------
// ContentNode
// ---------------------------------------------------------------------------

/// A node in the host's content graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: String,
    /// Host type name, e.g. `MarkdownRemark` or `File`.
    pub internal_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Source collection label; set on `File` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_instance_name: Option<String>,
    /// Raw node content (markdown body for `MarkdownRemark`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Fields written by hooks, keyed by field name.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ContentNode {
    /// Create a node with no parent, content, or fields.
    pub fn new(id: impl Into<String>, internal_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            internal_type: internal_type.into(),
            parent: None,
            source_instance_name: None,
            content: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_source_instance(mut self, name: impl Into<String>) -> Self {
        self.source_instance_name = Some(name.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_type(&self, internal_type: &str) -> bool {
        self.internal_type == internal_type
    }

    /// The `sourceName` field, if written.
    pub fn source_name(&self) -> Option<&str> {
        self.fields.get(FIELD_SOURCE_NAME).and_then(|v| v.as_str())
    }

    /// Decode the `stacks` field. A node without the field has no stacks.
    pub fn stacks(&self) -> Result<Vec<Stack>> {
        match self.fields.get(FIELD_STACKS) {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                StackPagesError::validation(format!(
                    "node {}: malformed {FIELD_STACKS} field: {e}",
                    self.id
                ))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeQuery
// ---------------------------------------------------------------------------

/// Filter over the content index: nodes of one type whose field equals a value.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeQuery {
    pub internal_type: String,
    pub field: String,
    pub equals: serde_json::Value,
}

impl NodeQuery {
    pub fn field_eq(
        internal_type: impl Into<String>,
        field: impl Into<String>,
        equals: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            internal_type: internal_type.into(),
            field: field.into(),
            equals: equals.into(),
        }
    }

    pub fn matches(&self, node: &ContentNode) -> bool {
        node.is_type(&self.internal_type) && node.fields.get(&self.field) == Some(&self.equals)
    }
}

// ---------------------------------------------------------------------------
// PageDescriptor
// ---------------------------------------------------------------------------

/// Render context handed to the page component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// Id of the content node the stack came from.
    pub id: String,
    pub stack_name: String,
}

/// A request to the host to materialize one output page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Route of the generated page.
    pub path: String,
    /// Component the page is rendered with.
    pub component: String,
    pub context: PageContext,
}
