//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use stackpages_core::enrichment::{EnrichOptions, Lookups, enrich_stacks};
use stackpages_core::pages::PageOptions;
use stackpages_core::pipeline::{BuildConfig, BuildResult, ProgressReporter, build_site};
use stackpages_lookup::{GitHubClient, StackShareClient};
use stackpages_shared::{AppConfig, StackCatalog, init_config, load_config, load_config_from};
use stackpages_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// StackPages: technology stack pages for a markdown site.
#[derive(Parser)]
#[command(
    name = "stackpages",
    version,
    about = "Tag markdown content, enrich technology stacks, and emit one page per stack.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.stackpages/stackpages.toml).
    #[arg(long, global = true, env = "STACKPAGES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Content index database (overrides `storage.db_path`).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Register content nodes, tag and enrich them, and emit stack pages.
    Build {
        /// Content root with one subdirectory per source.
        #[arg(long)]
        content: PathBuf,

        /// Stack catalog TOML (defaults to the builtin catalog).
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Enrich the stack catalog and print it as JSON.
    Enrich {
        /// Stack catalog TOML (defaults to the builtin catalog).
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// List pages registered by the last build.
    Pages,

    /// Print the stack catalog without enrichment.
    Catalog {
        /// Stack catalog TOML (defaults to the builtin catalog).
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stackpages=info",
        1 => "stackpages=debug",
        _ => "stackpages=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.db_path));

    match cli.command {
        Command::Build { content, catalog } => {
            cmd_build(&config, &db_path, content, catalog.as_deref()).await
        }
        Command::Enrich { catalog } => cmd_enrich(&config, catalog.as_deref()).await,
        Command::Pages => cmd_pages(&db_path).await,
        Command::Catalog { catalog } => cmd_catalog(catalog.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn load_catalog(path: Option<&Path>) -> Result<StackCatalog> {
    Ok(match path {
        Some(p) => StackCatalog::load(p)?,
        None => StackCatalog::builtin(),
    })
}

fn enrich_options(config: &AppConfig) -> EnrichOptions {
    EnrichOptions {
        max_concurrency: config.lookups.max_concurrency,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    config: &AppConfig,
    db_path: &Path,
    content: PathBuf,
    catalog: Option<&Path>,
) -> Result<()> {
    if !content.is_dir() {
        return Err(eyre!("content directory '{}' not found", content.display()));
    }
    let catalog = load_catalog(catalog)?;
    let github = GitHubClient::from_config(&config.lookups)?;
    let stackshare = StackShareClient::from_config(&config.lookups)?;
    let storage = Storage::open(db_path).await?;

    let build_config = BuildConfig {
        content_dir: content,
        pages: PageOptions::from(&config.pages),
        enrich: enrich_options(config),
    };

    info!(
        content = %build_config.content_dir.display(),
        db = %db_path.display(),
        stacks = catalog.stacks().len(),
        "building site"
    );

    let reporter = CliProgress::new();
    let result = build_site(
        &build_config,
        &catalog,
        Lookups {
            vcs: &github,
            catalog: &stackshare,
        },
        &storage,
        &reporter,
    )
    .await?;

    println!();
    println!("  Build complete!");
    println!("  ID:        {}", result.build_id);
    println!("  Nodes:     {} ({} markdown)", result.nodes, result.markdown_nodes);
    println!("  Enriched:  {}", result.enriched_nodes);
    println!("  Pages:     {}", result.pages);
    println!(
        "  Lookups:   {} ok, {} failed",
        result.report.vcs.succeeded + result.report.catalog.succeeded,
        result.report.failures()
    );
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_enrich(config: &AppConfig, catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    let github = GitHubClient::from_config(&config.lookups)?;
    let stackshare = StackShareClient::from_config(&config.lookups)?;

    let enriched = enrich_stacks(
        &catalog,
        Lookups {
            vcs: &github,
            catalog: &stackshare,
        },
        &enrich_options(config),
    )
    .await;

    info!(
        tools = enriched.report.tools,
        failures = enriched.report.failures(),
        "enrichment finished"
    );
    println!("{}", serde_json::to_string_pretty(&enriched.stacks)?);
    Ok(())
}

async fn cmd_pages(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        return Err(eyre!(
            "no content index at '{}': run `stackpages build` first",
            db_path.display()
        ));
    }
    let storage = Storage::open_readonly(db_path).await?;
    let pages = storage.list_pages().await?;

    if pages.is_empty() {
        println!("No pages registered.");
        return Ok(());
    }

    println!("{:<30} {:<30} NODE", "PATH", "STACK");
    for page in &pages {
        println!(
            "{:<30} {:<30} {}",
            page.path, page.context.stack_name, page.context.id
        );
    }
    println!();
    println!("{} page(s), component: {}", pages.len(), pages[0].component);
    Ok(())
}

fn cmd_catalog(catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    println!("{}", serde_json::to_string_pretty(catalog.stacks())?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn node_processed(&self, id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Tagging [{current}/{total}] {id}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}
