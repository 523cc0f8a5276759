//! In-memory host and lookup doubles shared by the core tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use stackpages_lookup::{CatalogLookup, LookupError, VcsLookup};
use stackpages_shared::{
    CatalogMetadata, ContentNode, NodeQuery, PageDescriptor, Result, StackPagesError, VcsMetadata,
};

use crate::host::{NodeCreationContext, PageBuildContext};

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MemoryHost {
    pub nodes: Mutex<BTreeMap<String, ContentNode>>,
    pub field_writes: Mutex<Vec<(String, String)>>,
    pub pages: Mutex<Vec<PageDescriptor>>,
    pub fail_queries: bool,
}

impl MemoryHost {
    pub fn with_nodes(nodes: impl IntoIterator<Item = ContentNode>) -> Self {
        let host = Self::default();
        {
            let mut map = host.nodes.lock().unwrap();
            for node in nodes {
                map.insert(node.id.clone(), node);
            }
        }
        host
    }

    pub fn node(&self, id: &str) -> ContentNode {
        self.nodes.lock().unwrap()[id].clone()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.field_writes.lock().unwrap().clone()
    }

    pub fn registered_pages(&self) -> Vec<PageDescriptor> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeCreationContext for MemoryHost {
    async fn resolve_node(&self, id: &str) -> Result<Option<ContentNode>> {
        Ok(self.nodes.lock().unwrap().get(id).cloned())
    }

    async fn register_field(
        &self,
        node_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| StackPagesError::node_not_found(node_id))?;
        node.fields.insert(name.to_string(), value);
        self.field_writes
            .lock()
            .unwrap()
            .push((node_id.to_string(), name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl PageBuildContext for MemoryHost {
    async fn query_index(&self, query: &NodeQuery) -> Result<Vec<ContentNode>> {
        if self.fail_queries {
            return Err(StackPagesError::Query("index unavailable".into()));
        }
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .values()
            .filter(|n| query.matches(n))
            .cloned()
            .collect())
    }

    async fn register_page(&self, page: PageDescriptor) -> Result<()> {
        self.pages.lock().unwrap().push(page);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Tracks how many lookups are in flight at once.
#[derive(Default)]
pub(crate) struct InFlight {
    current: AtomicUsize,
    pub max: AtomicUsize,
}

impl InFlight {
    async fn track<T>(&self, delay: Option<Duration>, f: impl FnOnce() -> T) -> T {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);
        f()
    }
}

/// VCS lookup answering from a fixed table; everything else is not found.
#[derive(Default)]
pub(crate) struct TableVcs {
    pub known: HashMap<(String, String), VcsMetadata>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub delay: Option<Duration>,
    pub in_flight: InFlight,
}

impl TableVcs {
    pub fn knowing(owner: &str, name: &str) -> Self {
        let mut known = HashMap::new();
        known.insert(
            (owner.to_string(), name.to_string()),
            VcsMetadata {
                full_name: format!("{owner}/{name}"),
                html_url: format!("https://github.com/{owner}/{name}"),
                stars: 42,
                ..Default::default()
            },
        );
        Self {
            known,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VcsLookup for TableVcs {
    async fn lookup(&self, owner: &str, name: &str) -> std::result::Result<VcsMetadata, LookupError> {
        self.calls
            .lock()
            .unwrap()
            .push((owner.to_string(), name.to_string()));
        self.in_flight
            .track(self.delay, || {
                self.known
                    .get(&(owner.to_string(), name.to_string()))
                    .cloned()
                    .ok_or_else(|| LookupError::NotFound(format!("{owner}/{name}")))
            })
            .await
    }

    fn source(&self) -> &str {
        "table-vcs"
    }
}

/// Catalog lookup answering from a fixed set of slugs.
#[derive(Default)]
pub(crate) struct TableCatalog {
    pub known: Vec<String>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub delay: Option<Duration>,
    pub in_flight: InFlight,
}

impl TableCatalog {
    pub fn knowing(slug: &str) -> Self {
        Self {
            known: vec![slug.to_string()],
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogLookup for TableCatalog {
    async fn lookup(&self, name: &str, url: &str) -> std::result::Result<CatalogMetadata, LookupError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), url.to_string()));
        self.in_flight
            .track(self.delay, || {
                if self.known.iter().any(|k| k == name) {
                    Ok(CatalogMetadata {
                        name: name.to_string(),
                        slug: name.to_string(),
                        canonical_url: url.to_string(),
                        ..Default::default()
                    })
                } else {
                    Err(LookupError::Network(format!("{url}: connection refused")))
                }
            })
            .await
    }

    fn source(&self) -> &str {
        "table-catalog"
    }
}
