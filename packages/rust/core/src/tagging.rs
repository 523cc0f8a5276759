//! Node-creation hook: tag markdown nodes with their source and attach
//! enriched stacks to the stacks source.

use tracing::{debug, info, instrument};

use stackpages_shared::{
    ContentNode, FIELD_SOURCE_NAME, FIELD_STACKS, FILE_NODE, MARKDOWN_REMARK, Result,
    StackCatalog, StackPagesError,
};

use crate::enrichment::{EnrichOptions, EnrichmentReport, Lookups, enrich_stacks};
use crate::host::NodeCreationContext;

/// What the hook did with a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// Not a markdown node; nothing written.
    Skipped,
    /// Tagged with its source (if the parent is a file) but not enriched.
    Tagged { source_name: Option<String> },
    /// Tagged and given an enriched `stacks` field.
    Enriched { report: EnrichmentReport },
}

/// Everything the node-creation hook needs besides the host.
pub struct NodeHook<'a> {
    /// Source instance whose nodes get stacks.
    pub source_name: String,
    pub catalog: &'a StackCatalog,
    pub lookups: Lookups<'a>,
    pub enrich: EnrichOptions,
}

impl NodeHook<'_> {
    /// Handle one created node.
    #[instrument(skip_all, fields(node = %node.id, kind = %node.internal_type))]
    pub async fn on_create_node(
        &self,
        node: &ContentNode,
        ctx: &dyn NodeCreationContext,
    ) -> Result<TagOutcome> {
        if !node.is_type(MARKDOWN_REMARK) {
            return Ok(TagOutcome::Skipped);
        }

        let parent_id = node.parent.as_deref().ok_or_else(|| {
            StackPagesError::node_not_found(format!("parent of {}", node.id))
        })?;
        let parent = ctx
            .resolve_node(parent_id)
            .await?
            .ok_or_else(|| StackPagesError::node_not_found(parent_id))?;

        let source_name = parent.source_instance_name.clone();
        if parent.is_type(FILE_NODE) {
            if let Some(source) = &source_name {
                ctx.register_field(&node.id, FIELD_SOURCE_NAME, source.as_str().into())
                    .await?;
            }
        }

        if source_name.as_deref() != Some(self.source_name.as_str()) {
            debug!(source = ?source_name, "not a stacks source, skipping enrichment");
            return Ok(TagOutcome::Tagged { source_name });
        }

        let enriched = enrich_stacks(self.catalog, self.lookups, &self.enrich).await;
        let value = serde_json::to_value(&enriched.stacks).map_err(|e| {
            StackPagesError::validation(format!("failed to serialize stacks: {e}"))
        })?;
        ctx.register_field(&node.id, FIELD_STACKS, value).await?;

        info!(
            stacks = enriched.stacks.len(),
            failures = enriched.report.failures(),
            "attached enriched stacks"
        );

        Ok(TagOutcome::Enriched {
            report: enriched.report,
        })
    }
}
