//! The stack catalog: the fixed set of stacks and tools that gets enriched.
//!
//! A catalog is built once at startup, either from [`StackCatalog::builtin`]
//! or from a TOML file, and handed to enrichment by reference.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackPagesError};
use crate::types::{RefLink, Stack, Tool};

/// Validated, ordered set of stacks. Stack paths are unique and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackCatalog {
    stacks: Vec<Stack>,
}

impl StackCatalog {
    /// Build a catalog, rejecting empty or duplicate stack paths.
    pub fn new(stacks: Vec<Stack>) -> Result<Self> {
        let mut seen = HashSet::new();
        for stack in &stacks {
            if stack.path.trim().is_empty() {
                return Err(StackPagesError::validation(format!(
                    "stack '{}' has an empty path",
                    stack.name
                )));
            }
            if !seen.insert(stack.path.as_str()) {
                return Err(StackPagesError::validation(format!(
                    "duplicate stack path '{}'",
                    stack.path
                )));
            }
        }
        Ok(Self { stacks })
    }

    /// The catalog shipped with the site.
    pub fn builtin() -> Self {
        Self {
            stacks: vec![Stack {
                name: "The JAMStack".into(),
                path: "the-jamstack".into(),
                category: "JAMStacks".into(),
                description: "JavaScript, APIs, markdown".into(),
                tools: vec![Tool {
                    name: "Markdown".into(),
                    description: "Markdown".into(),
                    url: "https://daringfireball.net/projects/markdown/syntax".into(),
                    git_hub: RefLink::new("https://github.com/Python-Markdown/markdown"),
                    stack_share: RefLink::new("https://stackshare.io/serverless"),
                    git_hub_data: None,
                    stack_share_data: None,
                }],
            }],
        }
    }

    /// Parse a catalog from TOML (`[[stacks]]` tables with nested `[[stacks.tools]]`).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: Self = toml::from_str(content)
            .map_err(|e| StackPagesError::validation(format!("invalid catalog: {e}")))?;
        Self::new(raw.stacks)
    }

    /// Load a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StackPagesError::io(path, e))?;
        let catalog = Self::from_toml_str(&content)?;
        tracing::debug!(?path, stacks = catalog.stacks.len(), "loaded stack catalog");
        Ok(catalog)
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Total number of tools across all stacks.
    pub fn tool_count(&self) -> usize {
        self.stacks.iter().map(|s| s.tools.len()).sum()
    }
}

impl Default for StackCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
