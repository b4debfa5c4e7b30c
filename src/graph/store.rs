//! SQLite implementation of [`GraphGateway`].
//!
//! Statements go through [`Connection::prepare_cached`], and every public
//! write runs inside one transaction so a failed batch leaves no partial rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::schema::initialize_database;
use crate::error::{RepoGraphError, Result};
use crate::graph::gateway::GraphGateway;
use crate::types::{GraphEdge, GraphNode, NodePayload};

// ---------------------------------------------------------------------------
// StoredGraphStats
// ---------------------------------------------------------------------------

/// Row counts for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoredGraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// SqliteGraphStore
// ---------------------------------------------------------------------------

pub struct SqliteGraphStore {
    pub conn: Connection,
}

impl std::fmt::Debug for SqliteGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGraphStore").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const UPSERT_NODE_SQL: &str = "\
INSERT INTO kg_nodes (repo_id, node_id, node_type, relative_path, stable_id, version_id,
                      payload, first_indexed_at, last_indexed_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
ON CONFLICT(repo_id, node_id) DO UPDATE SET
  node_type = excluded.node_type,
  relative_path = excluded.relative_path,
  stable_id = excluded.stable_id,
  version_id = excluded.version_id,
  payload = excluded.payload,
  last_indexed_at = excluded.last_indexed_at";

const UPSERT_EDGE_SQL: &str = "\
INSERT INTO kg_edges (repo_id, source_id, target_id, kind, first_indexed_at, last_indexed_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT(repo_id, source_id, target_id, kind) DO UPDATE SET
  last_indexed_at = excluded.last_indexed_at";

const NODE_EXISTS_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM kg_nodes WHERE repo_id = ?1 AND node_id = ?2)";

const DELETE_STALE_EDGES_SQL: &str = "\
DELETE FROM kg_edges WHERE repo_id = ?1 AND (
  source_id IN (SELECT node_id FROM kg_nodes WHERE repo_id = ?1 AND last_indexed_at < ?2)
  OR target_id IN (SELECT node_id FROM kg_nodes WHERE repo_id = ?1 AND last_indexed_at < ?2)
)";

const DELETE_STALE_NODES_SQL: &str =
    "DELETE FROM kg_nodes WHERE repo_id = ?1 AND last_indexed_at < ?2";

const SELECT_NODE_SQL: &str =
    "SELECT node_id, payload FROM kg_nodes WHERE repo_id = ?1 AND node_id = ?2";

const SELECT_BY_STABLE_ID_SQL: &str =
    "SELECT node_id, payload FROM kg_nodes WHERE repo_id = ?1 AND stable_id = ?2 ORDER BY node_id";

const SELECT_EDGES_FROM_SQL: &str = "\
SELECT source_id, target_id, kind FROM kg_edges
WHERE repo_id = ?1 AND source_id = ?2
ORDER BY kind, target_id";

/// Fixed-width UTC timestamps compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn node_columns(node: &GraphNode) -> (Option<&str>, Option<&str>, Option<&str>) {
    match &node.payload {
        NodePayload::File(f) => (Some(f.relative_path.as_str()), None, None),
        NodePayload::Symbol(s) => (
            Some(s.relative_path.as_str()),
            Some(s.stable_id.as_str()),
            Some(s.version_id.as_str()),
        ),
        NodePayload::Text(_) => (None, None, None),
    }
}

fn row_to_node(row: &rusqlite::Row<'_>) -> Result<GraphNode> {
    let node_id: String = row.get(0)?;
    let payload: String = row.get(1)?;
    Ok(GraphNode {
        node_id,
        payload: serde_json::from_str(&payload)?,
    })
}

impl SqliteGraphStore {
    /// Open (or create) the database at `db_path`, applying the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = initialize_database(db_path)?;
        Ok(Self { conn })
    }

    /// Wrap an already-initialized connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Writes with an explicit clock --------------------------------------

    pub fn upsert_nodes_at(
        &self,
        repo_id: &str,
        nodes: &[GraphNode],
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let now = timestamp(at);
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_NODE_SQL)?;
            for node in nodes {
                let (relative_path, stable_id, version_id) = node_columns(node);
                let payload = serde_json::to_string(&node.payload)?;
                stmt.execute(params![
                    repo_id,
                    node.node_id,
                    node.payload.kind_str(),
                    relative_path,
                    stable_id,
                    version_id,
                    payload,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(nodes.len())
    }

    pub fn upsert_edges_at(
        &self,
        repo_id: &str,
        edges: &[GraphEdge],
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let now = timestamp(at);
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut exists = tx.prepare_cached(NODE_EXISTS_SQL)?;
            let mut stmt = tx.prepare_cached(UPSERT_EDGE_SQL)?;
            for edge in edges {
                for endpoint in [&edge.source_id, &edge.target_id] {
                    let present: bool =
                        exists.query_row(params![repo_id, endpoint], |row| row.get(0))?;
                    if !present {
                        // Dropping `tx` rolls back everything written so far.
                        return Err(RepoGraphError::MissingEndpoint {
                            repo_id: repo_id.to_string(),
                            node_id: endpoint.clone(),
                        });
                    }
                }
                stmt.execute(params![
                    repo_id,
                    edge.source_id,
                    edge.target_id,
                    edge.kind.as_str(),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(edges.len())
    }

    /// Delete nodes of `repo_id` last indexed strictly before `cutoff`, plus
    /// their incident edges.
    pub fn delete_stale_before(&self, repo_id: &str, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = timestamp(cutoff);
        let tx = self.conn.unchecked_transaction()?;
        let deleted = {
            let edges = tx
                .prepare_cached(DELETE_STALE_EDGES_SQL)?
                .execute(params![repo_id, cutoff])?;
            let nodes = tx
                .prepare_cached(DELETE_STALE_NODES_SQL)?
                .execute(params![repo_id, cutoff])?;
            tracing::debug!(repo_id, nodes, edges, "deleted stale rows");
            nodes
        };
        tx.commit()?;
        Ok(deleted)
    }

    // -- Queries ------------------------------------------------------------

    pub fn get_node(&self, repo_id: &str, node_id: &str) -> Result<Option<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(SELECT_NODE_SQL)?;
        let mut rows = stmt.query_and_then(params![repo_id, node_id], row_to_node)?;
        rows.next().transpose()
    }

    /// Every stored symbol carrying `stable_id`. Usually one row; more when
    /// a symbol was duplicated across files.
    pub fn nodes_by_stable_id(&self, repo_id: &str, stable_id: &str) -> Result<Vec<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(SELECT_BY_STABLE_ID_SQL)?;
        let rows = stmt.query_and_then(params![repo_id, stable_id], row_to_node)?;
        rows.collect()
    }

    pub fn edges_from(&self, repo_id: &str, source_id: &str) -> Result<Vec<GraphEdge>> {
        let mut stmt = self.conn.prepare_cached(SELECT_EDGES_FROM_SQL)?;
        let rows = stmt.query_and_then(params![repo_id, source_id], |row| -> Result<GraphEdge> {
            let kind: String = row.get(2)?;
            let kind = crate::types::EdgeKind::from_str_loose(&kind)
                .ok_or_else(|| RepoGraphError::Other(format!("unknown edge kind `{kind}`")))?;
            Ok(GraphEdge::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                kind,
            ))
        })?;
        rows.collect()
    }

    pub fn last_indexed_at(&self, repo_id: &str, node_id: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT last_indexed_at FROM kg_nodes WHERE repo_id = ?1 AND node_id = ?2",
                params![repo_id, node_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn node_count(&self, repo_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM kg_nodes WHERE repo_id = ?1",
            [repo_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn edge_count(&self, repo_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM kg_edges WHERE repo_id = ?1",
            [repo_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn get_stats(&self, repo_id: &str) -> Result<StoredGraphStats> {
        let mut stats = StoredGraphStats {
            nodes: self.node_count(repo_id)?,
            edges: self.edge_count(repo_id)?,
            ..Default::default()
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT node_type, COUNT(*) FROM kg_nodes WHERE repo_id = ?1 GROUP BY node_type",
        )?;
        let rows = stmt.query_map([repo_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (node_type, count) = row?;
            stats.nodes_by_type.insert(node_type, count as usize);
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT kind, COUNT(*) FROM kg_edges WHERE repo_id = ?1 GROUP BY kind",
        )?;
        let rows = stmt.query_map([repo_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            stats.edges_by_kind.insert(kind, count as usize);
        }

        Ok(stats)
    }
}

impl GraphGateway for SqliteGraphStore {
    fn upsert_nodes(&self, repo_id: &str, nodes: &[GraphNode]) -> Result<usize> {
        self.upsert_nodes_at(repo_id, nodes, Utc::now())
    }

    fn upsert_edges(&self, repo_id: &str, edges: &[GraphEdge]) -> Result<usize> {
        self.upsert_edges_at(repo_id, edges, Utc::now())
    }

    fn delete_stale(&self, repo_id: &str, ttl_days: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(ttl_days));
        self.delete_stale_before(repo_id, cutoff)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
