//! Core build logic for StackPages.
//!
//! Ties the content index, node tagging, stack enrichment, and page emission
//! together into the `build` pipeline (see [`pipeline::build_site`]).

pub mod content;
pub mod enrichment;
pub mod host;
pub mod pages;
pub mod pipeline;
pub mod tagging;

#[cfg(test)]
mod testing;
