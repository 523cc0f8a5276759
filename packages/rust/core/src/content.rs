//! Content directory scanning.
//!
//! Layout: `<root>/<source>/**/*.md`. Every markdown file becomes a `File`
//! node labelled with its top-level directory name, plus a `MarkdownRemark`
//! child holding the file body. Node ids are derived from the relative path
//! so rebuilding the same tree updates nodes in place.

use std::path::{Path, PathBuf};

use tracing::debug;

use stackpages_shared::{ContentNode, FILE_NODE, MARKDOWN_REMARK, Result, StackPagesError};
use stackpages_storage::content_hash;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// A markdown file found under a content source directory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file: ContentNode,
    pub markdown: ContentNode,
}

/// Scan a content root for markdown files, grouped by source directory.
pub fn scan_content(root: &Path) -> Result<Vec<SourceFile>> {
    let mut sources = read_dir_sorted(root)?;
    sources.retain(|p| p.is_dir());

    let mut files = Vec::new();
    for source_dir in sources {
        let Some(source) = source_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let mut paths = Vec::new();
        collect_markdown(&source_dir, &mut paths)?;
        debug!(source, files = paths.len(), "scanned content source");

        for path in paths {
            let content =
                std::fs::read_to_string(&path).map_err(|e| StackPagesError::io(&path, e))?;
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            let file_id = node_id("file", &rel);
            let file = ContentNode::new(file_id.clone(), FILE_NODE).with_source_instance(source);
            let markdown = ContentNode::new(node_id("md", &rel), MARKDOWN_REMARK)
                .with_parent(file_id)
                .with_content(content);
            files.push(SourceFile { file, markdown });
        }
    }
    Ok(files)
}

fn node_id(prefix: &str, rel: &str) -> String {
    format!("{prefix}-{}", &content_hash(rel)[..16])
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for path in read_dir_sorted(dir)? {
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| MARKDOWN_EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| StackPagesError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| StackPagesError::io(dir, e))?.path());
    }
    paths.sort();
    Ok(paths)
}
