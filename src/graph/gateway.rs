//! Persistence boundary for built graphs.
//!
//! The builder never talks to a database. Whoever drives a build hands the
//! [`BuildResult`] to a [`GraphGateway`], which owns storage, idempotence and
//! staleness.

use crate::error::Result;
use crate::types::{BuildResult, GraphEdge, GraphNode};

/// Outcome of persisting one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub nodes_written: usize,
    pub edges_written: usize,
}

/// Idempotent writer for graph nodes and edges, partitioned by repository.
///
/// Upserts are keyed by `(repo_id, node_id)` and
/// `(repo_id, source_id, target_id, kind)`. Re-sending the same rows only
/// refreshes their payload and last-indexed timestamp.
pub trait GraphGateway {
    /// Insert or refresh `nodes` under `repo_id`. Returns the rows written.
    fn upsert_nodes(&self, repo_id: &str, nodes: &[GraphNode]) -> Result<usize>;

    /// Insert or refresh `edges` under `repo_id`.
    ///
    /// Both endpoints must already be stored for the same repository,
    /// otherwise the whole batch fails with
    /// [`MissingEndpoint`](crate::error::RepoGraphError::MissingEndpoint).
    fn upsert_edges(&self, repo_id: &str, edges: &[GraphEdge]) -> Result<usize>;

    /// Remove nodes of `repo_id` not refreshed within `ttl_days`, together
    /// with every edge touching them. Returns the number of nodes removed.
    fn delete_stale(&self, repo_id: &str, ttl_days: u32) -> Result<usize>;

    /// Nodes first, then edges, so every edge finds its endpoints.
    fn persist(&self, repo_id: &str, result: &BuildResult) -> Result<PersistSummary> {
        let nodes_written = self.upsert_nodes(repo_id, &result.nodes)?;
        let edges_written = self.upsert_edges(repo_id, &result.edges)?;
        Ok(PersistSummary {
            nodes_written,
            edges_written,
        })
    }
}
