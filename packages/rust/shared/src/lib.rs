//! Shared types, error model, and configuration for stackpages.
//!
//! This crate is the foundation depended on by all other stackpages crates.
//! It provides:
//! - [`StackPagesError`]: the unified error type
//! - Domain types ([`Stack`], [`Tool`], [`ContentNode`], [`PageDescriptor`])
//! - The [`StackCatalog`] that enrichment runs over
//! - Configuration ([`AppConfig`], config loading)

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use catalog::StackCatalog;
pub use config::{
    AppConfig, LookupsConfig, PagesConfig, README_STACKS_SOURCE, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, StackPagesError};
pub use types::{
    CatalogMetadata, ContentNode, FIELD_SOURCE_NAME, FIELD_STACKS, FILE_NODE, MARKDOWN_REMARK,
    NodeQuery, PageContext, PageDescriptor, RefLink, Stack, Tool, VcsMetadata,
};
