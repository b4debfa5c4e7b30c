//! Crate-wide error type.
//!
//! Only [`RepoGraphError::RootNotFound`] (and cancellation) abort a build.
//! Everything that goes wrong inside a single file is converted into an
//! [`IndexError`](crate::types::IndexError) entry on the build stats instead
//! of being propagated.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the graph builder, the config layer and the store.
#[derive(Debug, Error)]
pub enum RepoGraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("repository root not found or not a directory: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("no extraction adapter for language `{0}`")]
    UnsupportedLanguage(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("symbol extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("{path} is {size} bytes, above the {limit} byte ceiling")]
    SizeLimitExceeded { path: String, size: u64, limit: u64 },

    #[error("edge endpoint `{node_id}` is not stored for repo `{repo_id}`")]
    MissingEndpoint { repo_id: String, node_id: String },

    #[error("build cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl RepoGraphError {
    /// True for errors that end a whole build rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RootNotFound(_) | Self::Cancelled)
    }
}

impl From<serde_yaml::Error> for RepoGraphError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RepoGraphError>;
