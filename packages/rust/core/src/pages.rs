//! Page emission: one page per stack found on the stacks source's nodes.

use std::collections::{HashMap, HashSet};

use tracing::{error, info, instrument, warn};

use stackpages_shared::{
    ContentNode, FIELD_SOURCE_NAME, MARKDOWN_REMARK, NodeQuery, PageContext, PageDescriptor,
    PagesConfig, Result, StackPagesError,
};

use crate::host::PageBuildContext;

/// Which nodes to read and which component to render pages with.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub source_name: String,
    pub component: String,
}

impl From<&PagesConfig> for PageOptions {
    fn from(config: &PagesConfig) -> Self {
        Self {
            source_name: config.source_name.clone(),
            component: config.component.clone(),
        }
    }
}

/// Query the stacks source's nodes and register one page per stack.
///
/// Query failures are returned as-is. Two stacks claiming the same route are
/// rejected before any page is registered.
#[instrument(skip_all, fields(source = %opts.source_name))]
pub async fn create_pages(
    ctx: &dyn PageBuildContext,
    opts: &PageOptions,
) -> Result<Vec<PageDescriptor>> {
    let query = NodeQuery::field_eq(MARKDOWN_REMARK, FIELD_SOURCE_NAME, opts.source_name.as_str());
    let nodes = ctx.query_index(&query).await.map_err(|e| {
        error!(error = %e, "page query failed");
        e
    })?;

    if nodes.is_empty() {
        info!("no stacks nodes found, no pages to create");
        return Ok(Vec::new());
    }
    if nodes.len() > 1 {
        let collisions = shared_routes(&nodes)?;
        if collisions.is_empty() {
            warn!(count = nodes.len(), "more than one node carries stacks");
        } else {
            warn!(
                count = nodes.len(),
                routes = ?collisions,
                "more than one node carries stacks and their routes collide"
            );
        }
    }

    let mut pages = Vec::new();
    let mut routes = HashSet::new();
    for node in &nodes {
        for stack in node.stacks()? {
            if !routes.insert(stack.path.clone()) {
                return Err(StackPagesError::DuplicateRoute { path: stack.path });
            }
            pages.push(PageDescriptor {
                path: stack.path,
                component: opts.component.clone(),
                context: PageContext {
                    id: node.id.clone(),
                    stack_name: stack.name,
                },
            });
        }
    }

    for page in &pages {
        ctx.register_page(page.clone()).await?;
    }

    info!(pages = pages.len(), "registered stack pages");
    Ok(pages)
}

/// Routes claimed by more than one node, each listed once in first-seen order.
fn shared_routes(nodes: &[ContentNode]) -> Result<Vec<String>> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut shared = Vec::new();
    for node in nodes {
        for stack in node.stacks()? {
            match owners.get(&stack.path) {
                Some(owner) if *owner != node.id.as_str() => {
                    if !shared.contains(&stack.path) {
                        shared.push(stack.path);
                    }
                }
                Some(_) => {}
                None => {
                    owners.insert(stack.path, node.id.as_str());
                }
            }
        }
    }
    Ok(shared)
}
