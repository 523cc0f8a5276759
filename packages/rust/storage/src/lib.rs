//! libSQL content index (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the content graph
//! (nodes and the fields hooks write onto them), the pages registered for a
//! build, and build history.
//!
//! **Access rules:**
//! - `stackpages build`: read-write via [`Storage::open`]
//! - inspection commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use stackpages_shared::{
    ContentNode, NodeQuery, PageContext, PageDescriptor, Result, StackPagesError,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> StackPagesError {
    StackPagesError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StackPagesError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StackPagesError::Storage(format!(
                "no content index at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    StackPagesError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    pub fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(StackPagesError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Node operations
    // -----------------------------------------------------------------------

    /// Insert or replace a node, including any fields it already carries.
    pub async fn upsert_node(&self, node: &ContentNode) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let hash = node.content.as_deref().map(content_hash);
        self.conn
            .execute(
                "INSERT INTO nodes (id, internal_type, parent_id, source_instance_name, content, content_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   internal_type = excluded.internal_type,
                   parent_id = excluded.parent_id,
                   source_instance_name = excluded.source_instance_name,
                   content = excluded.content,
                   content_hash = excluded.content_hash",
                params![
                    node.id.as_str(),
                    node.internal_type.as_str(),
                    node.parent.as_deref(),
                    node.source_instance_name.as_deref(),
                    node.content.as_deref(),
                    hash.as_deref(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        for (name, value) in &node.fields {
            self.set_field(&node.id, name, value).await?;
        }
        Ok(())
    }

    /// Get a node by ID, with its fields.
    pub async fn get_node(&self, id: &str) -> Result<Option<ContentNode>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, internal_type, parent_id, source_instance_name, content
                 FROM nodes WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        let node = match rows.next().await {
            Ok(Some(row)) => row_to_node(&row)?,
            Ok(None) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };
        self.with_fields(node).await.map(Some)
    }

    /// List nodes in insertion order, optionally restricted to one type.
    pub async fn list_nodes(&self, internal_type: Option<&str>) -> Result<Vec<ContentNode>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, internal_type, parent_id, source_instance_name, content
                 FROM nodes WHERE ?1 IS NULL OR internal_type = ?1
                 ORDER BY created_at, id",
                params![internal_type],
            )
            .await
            .map_err(storage_err)?;

        let mut nodes = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => nodes.push(row_to_node(&row)?),
                Ok(None) => break,
                Err(e) => return Err(storage_err(e)),
            }
        }

        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            results.push(self.with_fields(node).await?);
        }
        Ok(results)
    }

    /// Write (or overwrite) one field on a node.
    pub async fn set_field(&self, node_id: &str, name: &str, value: &serde_json::Value) -> Result<()> {
        self.check_writable()?;
        let value_json = serde_json::to_string(value).map_err(storage_err)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO node_fields (node_id, name, value_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(node_id, name) DO UPDATE SET
                   value_json = excluded.value_json,
                   updated_at = excluded.updated_at",
                params![node_id, name, value_json.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// All fields written onto a node.
    pub async fn node_fields(&self, node_id: &str) -> Result<BTreeMap<String, serde_json::Value>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, value_json FROM node_fields WHERE node_id = ?1",
                params![node_id],
            )
            .await
            .map_err(storage_err)?;

        let mut fields = BTreeMap::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(storage_err(e)),
            };
            let name: String = row.get(0).map_err(storage_err)?;
            let raw: String = row.get(1).map_err(storage_err)?;
            let value = serde_json::from_str(&raw).map_err(|e| {
                StackPagesError::Storage(format!("node {node_id}: field {name}: {e}"))
            })?;
            fields.insert(name, value);
        }
        Ok(fields)
    }

    /// Nodes of the query's type whose field equals the query value.
    pub async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<ContentNode>> {
        let expected = serde_json::to_string(&query.equals).map_err(storage_err)?;
        let mut rows = self
            .conn
            .query(
                "SELECT n.id, n.internal_type, n.parent_id, n.source_instance_name, n.content
                 FROM nodes n
                 JOIN node_fields f ON f.node_id = n.id AND f.name = ?2
                 WHERE n.internal_type = ?1 AND f.value_json = ?3
                 ORDER BY n.created_at, n.id",
                params![
                    query.internal_type.as_str(),
                    query.field.as_str(),
                    expected.as_str()
                ],
            )
            .await
            .map_err(|e| StackPagesError::Query(e.to_string()))?;

        let mut nodes = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => nodes.push(row_to_node(&row)?),
                Ok(None) => break,
                Err(e) => return Err(StackPagesError::Query(e.to_string())),
            }
        }

        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            let node = self.with_fields(node).await.map_err(|e| match e {
                StackPagesError::Storage(msg) => StackPagesError::Query(msg),
                other => other,
            })?;
            results.push(node);
        }
        Ok(results)
    }

    /// Delete every node not in `keep`, together with its fields.
    /// Returns the number of nodes removed.
    pub async fn prune_nodes(&self, keep: &HashSet<String>) -> Result<usize> {
        self.check_writable()?;
        let mut rows = self
            .conn
            .query("SELECT id FROM nodes", params![])
            .await
            .map_err(storage_err)?;

        let mut stale = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let id: String = row.get(0).map_err(storage_err)?;
                    if !keep.contains(&id) {
                        stale.push(id);
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(storage_err(e)),
            }
        }

        // foreign_keys is off, so fields are not cascaded.
        for id in &stale {
            self.conn
                .execute("DELETE FROM node_fields WHERE node_id = ?1", params![id.as_str()])
                .await
                .map_err(storage_err)?;
            self.conn
                .execute("DELETE FROM nodes WHERE id = ?1", params![id.as_str()])
                .await
                .map_err(storage_err)?;
        }
        Ok(stale.len())
    }

    async fn with_fields(&self, mut node: ContentNode) -> Result<ContentNode> {
        node.fields = self.node_fields(&node.id).await?;
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Register a page. A route can only be registered once.
    pub async fn insert_page(&self, page: &PageDescriptor) -> Result<()> {
        self.check_writable()?;
        if self.get_page(&page.path).await?.is_some() {
            return Err(StackPagesError::DuplicateRoute {
                path: page.path.clone(),
            });
        }

        let context_json = serde_json::to_string(&page.context).map_err(storage_err)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO pages (path, component, context_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    page.path.as_str(),
                    page.component.as_str(),
                    context_json.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Get a page by route.
    pub async fn get_page(&self, path: &str) -> Result<Option<PageDescriptor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT path, component, context_json FROM pages WHERE path = ?1",
                params![path],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_page(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List registered pages ordered by route.
    pub async fn list_pages(&self) -> Result<Vec<PageDescriptor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT path, component, context_json FROM pages ORDER BY path",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => results.push(row_to_page(&row)?),
                Ok(None) => break,
                Err(e) => return Err(storage_err(e)),
            }
        }
        Ok(results)
    }

    /// Remove all registered pages (start of a fresh page emission).
    pub async fn clear_pages(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM pages", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Build history
    // -----------------------------------------------------------------------

    /// Record the start of a build. Returns the build ID.
    pub async fn insert_build(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO builds (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Mark a build as finished with summary stats.
    pub async fn finish_build(&self, build_id: &str, stats: &serde_json::Value) -> Result<()> {
        self.check_writable()?;
        let stats_json = serde_json::to_string(stats).map_err(storage_err)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE builds SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json.as_str(), build_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Stats of the most recent finished build, if any.
    pub async fn last_build_stats(&self) -> Result<Option<serde_json::Value>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM builds WHERE finished_at IS NOT NULL
                 ORDER BY started_at DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row.get(0).map_err(storage_err)?;
                serde_json::from_str(&raw).map(Some).map_err(storage_err)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }
}

/// SHA-256 hex digest of node content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn row_to_node(row: &libsql::Row) -> Result<ContentNode> {
    Ok(ContentNode {
        id: row.get(0).map_err(storage_err)?,
        internal_type: row.get(1).map_err(storage_err)?,
        parent: row.get::<String>(2).ok(),
        source_instance_name: row.get::<String>(3).ok(),
        content: row.get::<String>(4).ok(),
        fields: BTreeMap::new(),
    })
}

fn row_to_page(row: &libsql::Row) -> Result<PageDescriptor> {
    let raw: String = row.get(2).map_err(storage_err)?;
    let context: PageContext = serde_json::from_str(&raw).map_err(storage_err)?;
    Ok(PageDescriptor {
        path: row.get(0).map_err(storage_err)?,
        component: row.get(1).map_err(storage_err)?,
        context,
    })
}
