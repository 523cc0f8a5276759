//! Stack enrichment fan-out.
//!
//! Every tool of every stack is looked up against the VCS and catalog
//! sources at the same time. Each lookup settles on its own: a failure is
//! logged and leaves that one metadata field unset, and enrichment as a whole
//! never fails.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stackpages_lookup::{CatalogLookup, LookupError, VcsLookup, catalog_ref, vcs_ref};
use stackpages_shared::{CatalogMetadata, Stack, StackCatalog, Tool, VcsMetadata};

/// The two metadata sources enrichment consults.
#[derive(Clone, Copy)]
pub struct Lookups<'a> {
    pub vcs: &'a dyn VcsLookup,
    pub catalog: &'a dyn CatalogLookup,
}

/// Tuning for the fan-out.
#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    /// Upper bound on tools enriched at once. `None` enriches every tool at once.
    pub max_concurrency: Option<usize>,
}

/// Per-source lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SourceStats {
    fn record(&mut self, attempt: Attempt) {
        match attempt {
            Attempt::Skipped => {}
            Attempt::Succeeded => {
                self.attempted += 1;
                self.succeeded += 1;
            }
            Attempt::Failed => {
                self.attempted += 1;
                self.failed += 1;
            }
        }
    }

    fn absorb(&mut self, other: SourceStats) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// What happened during one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub tools: usize,
    pub vcs: SourceStats,
    pub catalog: SourceStats,
}

impl EnrichmentReport {
    /// Add another run's counters to this one.
    pub fn absorb(&mut self, other: &EnrichmentReport) {
        self.tools += other.tools;
        self.vcs.absorb(other.vcs);
        self.catalog.absorb(other.catalog);
    }

    pub fn failures(&self) -> usize {
        self.vcs.failed + self.catalog.failed
    }
}

/// Enriched copy of a catalog's stacks.
#[derive(Debug, Clone)]
pub struct EnrichedStacks {
    pub stacks: Vec<Stack>,
    pub report: EnrichmentReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Skipped,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct ToolOutcome {
    vcs: Attempt,
    catalog: Attempt,
}

/// Enrich a fresh copy of the catalog's stacks with looked-up metadata.
///
/// Completes once every lookup has either succeeded or failed.
#[instrument(skip_all, fields(stacks = catalog.stacks().len(), tools = catalog.tool_count()))]
pub async fn enrich_stacks(
    catalog: &StackCatalog,
    lookups: Lookups<'_>,
    opts: &EnrichOptions,
) -> EnrichedStacks {
    let mut stacks = catalog.stacks().to_vec();
    let tool_count = catalog.tool_count();
    let limit = opts.max_concurrency.unwrap_or(tool_count).max(1);

    debug!(limit, "starting enrichment fan-out");

    let outcomes: Vec<ToolOutcome> = stream::iter(stacks.iter_mut().flat_map(|stack| {
        let stack_name = stack.name.clone();
        stack
            .tools
            .iter_mut()
            .map(move |tool| enrich_tool(stack_name.clone(), tool, lookups))
    }))
    .buffer_unordered(limit)
    .collect()
    .await;

    let mut report = EnrichmentReport {
        tools: outcomes.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        report.vcs.record(outcome.vcs);
        report.catalog.record(outcome.catalog);
    }

    info!(
        vcs_ok = report.vcs.succeeded,
        vcs_failed = report.vcs.failed,
        catalog_ok = report.catalog.succeeded,
        catalog_failed = report.catalog.failed,
        "enrichment complete"
    );

    EnrichedStacks { stacks, report }
}

/// Run both lookups for one tool concurrently and attach whatever succeeded.
async fn enrich_tool(stack: String, tool: &mut Tool, lookups: Lookups<'_>) -> ToolOutcome {
    let (vcs, catalog) = tokio::join!(
        fetch_vcs(tool.git_hub.as_url(), lookups.vcs),
        fetch_catalog(tool.stack_share.as_url(), lookups.catalog),
    );

    let vcs = match vcs {
        None => Attempt::Skipped,
        Some(Ok(meta)) => {
            tool.git_hub_data = Some(meta);
            Attempt::Succeeded
        }
        Some(Err(e)) => {
            warn!(
                stack = %stack,
                tool = %tool.name,
                source = lookups.vcs.source(),
                error = %e,
                "vcs lookup failed"
            );
            Attempt::Failed
        }
    };

    let catalog = match catalog {
        None => Attempt::Skipped,
        Some(Ok(meta)) => {
            tool.stack_share_data = Some(meta);
            Attempt::Succeeded
        }
        Some(Err(e)) => {
            warn!(
                stack = %stack,
                tool = %tool.name,
                source = lookups.catalog.source(),
                error = %e,
                "catalog lookup failed"
            );
            Attempt::Failed
        }
    };

    ToolOutcome { vcs, catalog }
}

async fn fetch_vcs(
    url: Option<&str>,
    lookup: &dyn VcsLookup,
) -> Option<Result<VcsMetadata, LookupError>> {
    let url = url?;
    let r = vcs_ref(url);
    Some(lookup.lookup(&r.owner, &r.name).await)
}

async fn fetch_catalog(
    url: Option<&str>,
    lookup: &dyn CatalogLookup,
) -> Option<Result<CatalogMetadata, LookupError>> {
    let url = url?;
    let name = catalog_ref(url);
    Some(lookup.lookup(&name, url).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use stackpages_shared::RefLink;

    use crate::testing::{TableCatalog, TableVcs};

    fn tool(name: &str, git_hub: Option<&str>, stack_share: Option<&str>) -> Tool {
        Tool {
            name: name.into(),
            description: String::new(),
            url: format!("https://{name}.example.com"),
            git_hub: git_hub.map(RefLink::new).unwrap_or_default(),
            stack_share: stack_share.map(RefLink::new).unwrap_or_default(),
            git_hub_data: None,
            stack_share_data: None,
        }
    }

    fn catalog(tools: Vec<Tool>) -> StackCatalog {
        StackCatalog::new(vec![Stack {
            name: "Test Stack".into(),
            path: "test-stack".into(),
            category: "Tests".into(),
            description: String::new(),
            tools,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn attaches_metadata_from_both_sources() {
        let vcs = TableVcs::knowing("Python-Markdown", "markdown");
        let cat = TableCatalog::knowing("serverless");
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let enriched =
            enrich_stacks(&StackCatalog::builtin(), lookups, &EnrichOptions::default()).await;

        let tool = &enriched.stacks[0].tools[0];
        assert_eq!(
            tool.git_hub_data.as_ref().map(|m| m.full_name.as_str()),
            Some("Python-Markdown/markdown")
        );
        assert_eq!(
            tool.stack_share_data.as_ref().map(|m| m.slug.as_str()),
            Some("serverless")
        );
        assert_eq!(
            cat.calls(),
            vec![(
                "serverless".to_string(),
                "https://stackshare.io/serverless".to_string()
            )]
        );
        assert_eq!(enriched.report.vcs.succeeded, 1);
        assert_eq!(enriched.report.catalog.succeeded, 1);
        assert_eq!(enriched.report.failures(), 0);
    }

    #[tokio::test]
    async fn passes_parsed_owner_and_name() {
        let vcs = TableVcs::default();
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let c = catalog(vec![tool("x", Some("https://github.com/OwnerX/NameY"), None)]);
        enrich_stacks(&c, lookups, &EnrichOptions::default()).await;

        assert_eq!(vcs.calls(), vec![("OwnerX".to_string(), "NameY".to_string())]);
        assert!(cat.calls().is_empty());
    }

    #[tokio::test]
    async fn always_failing_lookups_leave_metadata_unset() {
        let vcs = TableVcs::default();
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let c = catalog(vec![
            tool("a", Some("https://github.com/a/a"), Some("https://stackshare.io/a")),
            tool("b", Some("https://github.com/b/b"), Some("https://stackshare.io/b")),
        ]);
        let enriched = enrich_stacks(&c, lookups, &EnrichOptions::default()).await;

        for t in &enriched.stacks[0].tools {
            assert!(t.git_hub_data.is_none());
            assert!(t.stack_share_data.is_none());
        }
        assert_eq!(enriched.report.vcs.failed, 2);
        assert_eq!(enriched.report.catalog.failed, 2);
        assert_eq!(enriched.report.failures(), 4);
    }

    #[tokio::test]
    async fn one_source_failing_does_not_affect_the_other() {
        let vcs = TableVcs::knowing("a", "a");
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let c = catalog(vec![tool(
            "a",
            Some("https://github.com/a/a"),
            Some("https://stackshare.io/a"),
        )]);
        let enriched = enrich_stacks(&c, lookups, &EnrichOptions::default()).await;

        let t = &enriched.stacks[0].tools[0];
        assert!(t.git_hub_data.is_some());
        assert!(t.stack_share_data.is_none());
    }

    #[tokio::test]
    async fn tool_without_refs_performs_no_lookups() {
        let vcs = TableVcs::default();
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let c = catalog(vec![tool("plain", None, Some(""))]);
        let enriched = enrich_stacks(&c, lookups, &EnrichOptions::default()).await;

        assert!(vcs.calls().is_empty());
        assert!(cat.calls().is_empty());
        assert_eq!(enriched.stacks[0].tools[0], c.stacks()[0].tools[0]);
        assert_eq!(enriched.report.tools, 1);
        assert_eq!(enriched.report.vcs.attempted, 0);
    }

    #[tokio::test]
    async fn malformed_reference_is_an_ordinary_failure() {
        let vcs = TableVcs::default();
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let c = catalog(vec![tool("odd", Some("https://gitlab.com/a/b"), None)]);
        let enriched = enrich_stacks(&c, lookups, &EnrichOptions::default()).await;

        assert_eq!(vcs.calls(), vec![("https:".to_string(), String::new())]);
        assert_eq!(enriched.report.vcs.failed, 1);
    }

    #[tokio::test]
    async fn catalog_is_not_mutated() {
        let vcs = TableVcs::knowing("Python-Markdown", "markdown");
        let cat = TableCatalog::knowing("serverless");
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let builtin = StackCatalog::builtin();
        enrich_stacks(&builtin, lookups, &EnrichOptions::default()).await;
        assert!(builtin.stacks()[0].tools[0].git_hub_data.is_none());
    }

    #[tokio::test]
    async fn lookups_run_concurrently_by_default() {
        let vcs = TableVcs {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let tools = (0..4)
            .map(|i| tool(&format!("t{i}"), Some(format!("https://github.com/o/r{i}").as_str()), None))
            .collect();
        enrich_stacks(&catalog(tools), lookups, &EnrichOptions::default()).await;

        assert_eq!(vcs.calls().len(), 4);
        assert_eq!(vcs.in_flight.max.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn tools_across_stacks_run_together_and_keep_their_place() {
        let mut vcs = TableVcs {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        for name in ["a1", "b1"] {
            vcs.known.insert(
                ("o".to_string(), name.to_string()),
                VcsMetadata {
                    full_name: format!("o/{name}"),
                    ..Default::default()
                },
            );
        }
        let cat = TableCatalog::knowing("a2-slug");
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let stack = |name: &str, path: &str, tools: Vec<Tool>| Stack {
            name: name.into(),
            path: path.into(),
            category: "Tests".into(),
            description: String::new(),
            tools,
        };
        let catalog = StackCatalog::new(vec![
            stack(
                "Stack A",
                "stack-a",
                vec![
                    tool("a1", Some("https://github.com/o/a1"), None),
                    tool(
                        "a2",
                        Some("https://github.com/o/a2"),
                        Some("https://stackshare.io/a2-slug"),
                    ),
                ],
            ),
            stack(
                "Stack B",
                "stack-b",
                vec![tool("b1", Some("https://github.com/o/b1"), None)],
            ),
        ])
        .unwrap();

        let enriched = enrich_stacks(&catalog, lookups, &EnrichOptions::default()).await;

        assert_eq!(vcs.in_flight.max.load(Ordering::SeqCst), 3);
        assert_eq!(enriched.report.tools, 3);

        let a = &enriched.stacks[0];
        let b = &enriched.stacks[1];
        assert_eq!(a.path, "stack-a");
        assert_eq!(
            a.tools[0].git_hub_data.as_ref().map(|m| m.full_name.as_str()),
            Some("o/a1")
        );
        assert!(a.tools[0].stack_share_data.is_none());
        assert!(a.tools[1].git_hub_data.is_none());
        assert_eq!(
            a.tools[1].stack_share_data.as_ref().map(|m| m.slug.as_str()),
            Some("a2-slug")
        );
        assert_eq!(b.tools.len(), 1);
        assert_eq!(
            b.tools[0].git_hub_data.as_ref().map(|m| m.full_name.as_str()),
            Some("o/b1")
        );
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let vcs = TableVcs {
            delay: Some(Duration::from_millis(5)),
            ..Default::default()
        };
        let cat = TableCatalog::default();
        let lookups = Lookups {
            vcs: &vcs,
            catalog: &cat,
        };

        let tools = (0..4)
            .map(|i| tool(&format!("t{i}"), Some(format!("https://github.com/o/r{i}").as_str()), None))
            .collect();
        let opts = EnrichOptions {
            max_concurrency: Some(1),
        };
        enrich_stacks(&catalog(tools), lookups, &opts).await;

        assert_eq!(vcs.calls().len(), 4);
        assert_eq!(vcs.in_flight.max.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn report_absorb_sums_counters() {
        let mut total = EnrichmentReport::default();
        let run = EnrichmentReport {
            tools: 2,
            vcs: SourceStats {
                attempted: 2,
                succeeded: 1,
                failed: 1,
            },
            catalog: SourceStats::default(),
        };
        total.absorb(&run);
        total.absorb(&run);
        assert_eq!(total.tools, 4);
        assert_eq!(total.vcs.failed, 2);
        assert_eq!(total.failures(), 2);
    }
}
