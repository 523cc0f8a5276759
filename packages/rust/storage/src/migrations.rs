//! SQL migration definitions for the content index.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: nodes, node_fields, pages",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Content graph nodes
CREATE TABLE IF NOT EXISTS nodes (
    id                   TEXT PRIMARY KEY,
    internal_type        TEXT NOT NULL,
    parent_id            TEXT,
    source_instance_name TEXT,
    content              TEXT,
    content_hash         TEXT,
    created_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(internal_type);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);

-- Fields written onto nodes by hooks (JSON values)
CREATE TABLE IF NOT EXISTS node_fields (
    node_id    TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    name       TEXT NOT NULL,
    value_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (node_id, name)
);

CREATE INDEX IF NOT EXISTS idx_node_fields_lookup ON node_fields(name, value_json);

-- Registered pages, one per route
CREATE TABLE IF NOT EXISTS pages (
    path         TEXT PRIMARY KEY,
    component    TEXT NOT NULL,
    context_json TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Build history",
            sql: r#"
CREATE TABLE IF NOT EXISTS builds (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
