//! End-to-end `build` pipeline: content dir → nodes → tagging → pages.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;
use tracing::{info, instrument};

use stackpages_shared::{Result, StackCatalog};
use stackpages_storage::Storage;

use crate::content::scan_content;
use crate::enrichment::{EnrichOptions, EnrichmentReport, Lookups};
use crate::pages::{PageOptions, create_pages};
use crate::tagging::{NodeHook, TagOutcome};

/// Configuration for the `build_site` pipeline.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root holding one subdirectory per content source.
    pub content_dir: PathBuf,
    /// Source name and page component for emission.
    pub pages: PageOptions,
    pub enrich: EnrichOptions,
}

/// Result of the `build_site` pipeline.
#[derive(Debug)]
pub struct BuildResult {
    pub build_id: String,
    /// Nodes registered (files and markdown).
    pub nodes: usize,
    pub markdown_nodes: usize,
    /// Markdown nodes that received a `stacks` field.
    pub enriched_nodes: usize,
    pub pages: usize,
    /// Lookup counters summed over every enriched node.
    pub report: EnrichmentReport,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after the hook has run on a markdown node.
    fn node_processed(&self, id: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn node_processed(&self, _id: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full build.
///
/// 1. Scan the content dir, register File + MarkdownRemark nodes, and drop
///    nodes whose files are gone
/// 2. Run the node-creation hook on every markdown node
/// 3. Replace the page set with freshly emitted pages
/// 4. Record build stats
#[instrument(skip_all, fields(content = %config.content_dir.display()))]
pub async fn build_site(
    config: &BuildConfig,
    catalog: &StackCatalog,
    lookups: Lookups<'_>,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();
    storage.check_writable()?;
    let build_id = storage.insert_build().await?;
    info!(%build_id, "starting build");

    // --- Phase 1: Source nodes ---
    progress.phase("Scanning content");
    let files = scan_content(&config.content_dir)?;
    let mut seen = HashSet::with_capacity(files.len() * 2);
    for file in &files {
        storage.upsert_node(&file.file).await?;
        storage.upsert_node(&file.markdown).await?;
        seen.insert(file.file.id.clone());
        seen.insert(file.markdown.id.clone());
    }
    let pruned = storage.prune_nodes(&seen).await?;
    info!(files = files.len(), pruned, "registered source nodes");

    // --- Phase 2: Node hook ---
    progress.phase("Tagging nodes");
    let hook = NodeHook {
        source_name: config.pages.source_name.clone(),
        catalog,
        lookups,
        enrich: config.enrich.clone(),
    };
    let mut report = EnrichmentReport::default();
    let mut enriched_nodes = 0;
    for (i, file) in files.iter().enumerate() {
        if let TagOutcome::Enriched { report: r } =
            hook.on_create_node(&file.markdown, storage).await?
        {
            enriched_nodes += 1;
            report.absorb(&r);
        }
        progress.node_processed(&file.markdown.id, i + 1, files.len());
    }

    // --- Phase 3: Pages ---
    progress.phase("Creating pages");
    storage.clear_pages().await?;
    let pages = create_pages(storage, &config.pages).await?;

    // --- Phase 4: Stats ---
    let result = BuildResult {
        build_id,
        nodes: files.len() * 2,
        markdown_nodes: files.len(),
        enriched_nodes,
        pages: pages.len(),
        report,
        elapsed: start.elapsed(),
    };
    let stats = json!({
        "nodes": result.nodes,
        "markdownNodes": result.markdown_nodes,
        "enrichedNodes": result.enriched_nodes,
        "pages": result.pages,
        "enrichment": result.report,
        "elapsedMs": result.elapsed.as_millis() as u64,
    });
    storage.finish_build(&result.build_id, &stats).await?;

    info!(
        pages = result.pages,
        enriched = result.enriched_nodes,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "build complete"
    );
    progress.done(&result);
    Ok(result)
}
