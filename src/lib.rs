//! repograph: builds a repository knowledge graph.
//!
//! A build walks one checkout and emits file/directory nodes, code symbols
//! with cross-commit stable identities, and overlapping documentation
//! chunks, linked by typed edges. Persistence sits behind
//! [`graph::GraphGateway`], with a SQLite store shipped in [`graph::store`].

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod observability;
pub mod types;

pub use config::BuildConfig;
pub use error::{RepoGraphError, Result};
pub use indexer::GraphBuilder;
pub use types::BuildResult;
