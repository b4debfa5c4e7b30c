//! Structured logging and build metrics.
//!
//! - [`init_logging`]: one-time `tracing` setup with `RUST_LOG` support
//! - [`BuildMetrics`]: summary of a finished build, serializable to JSON

use std::collections::BTreeMap;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::types::{BuildResult, EdgeKind};

/// Initialize structured logging with `RUST_LOG` environment variable support.
///
/// Defaults to `repograph=info`. Logs go to stderr so `--json` output on
/// stdout stays machine-readable. Later calls are ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repograph=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Counters for one build, flattened for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMetrics {
    pub duration_ms: Option<u64>,
    pub nodes: usize,
    pub edges: usize,
    pub edges_by_kind: BTreeMap<&'static str, usize>,
    pub total_files: usize,
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_directories: usize,
    pub total_symbols: usize,
    pub truncated_symbols: usize,
    pub total_text_chunks: usize,
    pub large_files_batched: usize,
    pub errors_by_kind: BTreeMap<&'static str, usize>,
}

impl BuildMetrics {
    pub fn from_result(result: &BuildResult, elapsed: Option<Duration>) -> Self {
        let stats = &result.stats;

        let mut edges_by_kind = BTreeMap::new();
        for edge in &result.edges {
            *edges_by_kind.entry(edge.kind.as_str()).or_insert(0) += 1;
        }
        let mut errors_by_kind = BTreeMap::new();
        for err in &stats.errors {
            *errors_by_kind.entry(err.kind.as_str()).or_insert(0) += 1;
        }

        Self {
            duration_ms: elapsed.map(|d| d.as_millis() as u64),
            nodes: result.nodes.len(),
            edges: result.edges.len(),
            edges_by_kind,
            total_files: stats.total_files,
            indexed_files: stats.indexed_files,
            skipped_files: stats.skipped_files,
            failed_files: stats.failed_files,
            total_directories: stats.total_directories,
            total_symbols: stats.total_symbols,
            truncated_symbols: stats.truncated_symbols,
            total_text_chunks: stats.total_text_chunks,
            large_files_batched: stats.large_files_batched,
            errors_by_kind,
        }
    }

    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.edges_by_kind.get(kind.as_str()).copied().unwrap_or(0)
    }

    pub fn error_count(&self) -> usize {
        self.errors_by_kind.values().sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "duration_ms": self.duration_ms,
            "nodes": self.nodes,
            "edges": self.edges,
            "edges_by_kind": self.edges_by_kind,
            "total_files": self.total_files,
            "indexed_files": self.indexed_files,
            "skipped_files": self.skipped_files,
            "failed_files": self.failed_files,
            "total_directories": self.total_directories,
            "total_symbols": self.total_symbols,
            "truncated_symbols": self.truncated_symbols,
            "total_text_chunks": self.total_text_chunks,
            "large_files_batched": self.large_files_batched,
            "errors_by_kind": self.errors_by_kind,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
