//! Configuration data structures for a graph build.
//!
//! One [`BuildConfig`] value carries everything a build needs: which
//! repository and commit it describes, where the checkout lives, what to
//! exclude, and the size/chunking limits. Nothing inside the builder reads
//! the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RepoGraphError, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for one `(repo_id, commit_sha)` build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Partition key for everything this build persists.
    #[serde(default)]
    pub repo_id: String,

    /// Commit the checkout corresponds to; feeds `version_id`.
    #[serde(default)]
    pub commit_sha: String,

    /// Checkout root on disk.
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,

    #[serde(default)]
    pub exclude: ExcludeConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Emit best-effort IMPORTS / CALLS edges after assembly.
    #[serde(default = "default_true")]
    pub resolve_references: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            repo_id: String::new(),
            commit_sha: String::new(),
            repo_root: default_repo_root(),
            exclude: ExcludeConfig::default(),
            limits: LimitsConfig::default(),
            chunking: ChunkingConfig::default(),
            resolve_references: true,
        }
    }
}

impl BuildConfig {
    /// Config for `repo_root` with every other knob at its default.
    pub fn new(
        repo_id: impl Into<String>,
        commit_sha: impl Into<String>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            commit_sha: commit_sha.into(),
            repo_root: repo_root.into(),
            ..Self::default()
        }
    }

    /// Reject configurations the builder cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.repo_id.trim().is_empty() {
            return Err(RepoGraphError::Config("repo_id must not be empty".into()));
        }
        if self.limits.max_file_size_bytes > self.limits.max_absolute_file_size_bytes {
            return Err(RepoGraphError::Config(format!(
                "max_file_size_bytes ({}) exceeds max_absolute_file_size_bytes ({})",
                self.limits.max_file_size_bytes, self.limits.max_absolute_file_size_bytes
            )));
        }
        if self.limits.symbol_batch_size == 0 {
            return Err(RepoGraphError::Config(
                "symbol_batch_size must be at least 1".into(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(RepoGraphError::Config("chunk_size must be at least 1".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RepoGraphError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExcludeConfig
// ---------------------------------------------------------------------------

/// Names skipped during traversal. Matching is case-insensitive; directory
/// entries may use `*` / `?` wildcards (e.g. `*.egg-info`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeConfig {
    #[serde(default = "default_excluded_dirs")]
    pub dirs: Vec<String>,

    #[serde(default = "default_excluded_files")]
    pub files: Vec<String>,

    /// Hidden names that are still indexed.
    #[serde(default = "default_allowed_hidden")]
    pub allowed_hidden: Vec<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            dirs: default_excluded_dirs(),
            files: default_excluded_files(),
            allowed_hidden: default_allowed_hidden(),
        }
    }
}

// ---------------------------------------------------------------------------
// LimitsConfig
// ---------------------------------------------------------------------------

/// Size ceilings and per-file symbol caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Files up to this size take the direct extraction path.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Files above this size are skipped without being opened.
    #[serde(default = "default_max_absolute_file_size")]
    pub max_absolute_file_size_bytes: u64,

    #[serde(default = "default_max_symbols_per_file")]
    pub max_symbols_per_file: usize,

    /// Symbols materialised per batch on the large-file path.
    #[serde(default = "default_symbol_batch_size")]
    pub symbol_batch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            max_absolute_file_size_bytes: default_max_absolute_file_size(),
            max_symbols_per_file: default_max_symbols_per_file(),
            symbol_batch_size: default_symbol_batch_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkingConfig
// ---------------------------------------------------------------------------

/// Text chunk window, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_repo_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_excluded_dirs() -> Vec<String> {
    [
        ".git",
        ".hg",
        ".svn",
        "node_modules",
        "__pycache__",
        ".venv",
        "venv",
        "env",
        ".tox",
        ".mypy_cache",
        ".pytest_cache",
        ".ruff_cache",
        "dist",
        "build",
        "target",
        ".idea",
        ".vscode",
        "coverage",
        "htmlcov",
        "*.egg-info",
        ".next",
        ".nuxt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_excluded_files() -> Vec<String> {
    [
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "poetry.lock",
        "Cargo.lock",
        ".DS_Store",
        "Thumbs.db",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_allowed_hidden() -> Vec<String> {
    vec![".env".to_string(), ".envrc".to_string()]
}

fn default_max_file_size() -> u64 {
    1_000_000
}

fn default_max_absolute_file_size() -> u64 {
    10_000_000
}

fn default_max_symbols_per_file() -> usize {
    500
}

fn default_symbol_batch_size() -> usize {
    50
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn valid() -> BuildConfig {
        BuildConfig::new("acme/widgets", "abc123", "/tmp/widgets")
    }

    #[test]
    fn test_default_limits() {
        let cfg = BuildConfig::default();
        assert_eq!(cfg.limits.max_file_size_bytes, 1_000_000);
        assert_eq!(cfg.limits.max_absolute_file_size_bytes, 10_000_000);
        assert_eq!(cfg.limits.max_symbols_per_file, 500);
        assert_eq!(cfg.limits.symbol_batch_size, 50);
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert!(cfg.resolve_references);
    }

    #[test]
    fn test_default_exclusions_cover_vcs_and_deps() {
        let cfg = BuildConfig::default();
        for name in [".git", "node_modules", "__pycache__", "*.egg-info"] {
            assert!(
                cfg.exclude.dirs.iter().any(|d| d == name),
                "{name} should be excluded by default"
            );
        }
        assert!(cfg.exclude.files.iter().any(|f| f == "package-lock.json"));
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = "repo_id: acme/widgets\ncommit_sha: deadbeef\n";
        let cfg: BuildConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.repo_id, "acme/widgets");
        assert_eq!(cfg.commit_sha, "deadbeef");
        assert_eq!(cfg.repo_root, PathBuf::from("."));
        assert_eq!(cfg.limits, LimitsConfig::default());
        assert_eq!(cfg.exclude, ExcludeConfig::default());
    }

    #[test]
    fn test_full_yaml_config() {
        let yaml = r#"
repo_id: acme/widgets
commit_sha: deadbeef
repo_root: /srv/widgets
resolve_references: false
exclude:
  dirs: [vendor, "*.cache"]
  files: [secrets.txt]
limits:
  max_file_size_bytes: 500
  max_absolute_file_size_bytes: 5000
  max_symbols_per_file: 10
  symbol_batch_size: 2
chunking:
  chunk_size: 300
  chunk_overlap: 0
"#;
        let cfg: BuildConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.exclude.dirs, vec!["vendor", "*.cache"]);
        assert_eq!(cfg.exclude.files, vec!["secrets.txt"]);
        assert_eq!(cfg.exclude.allowed_hidden, vec![".env", ".envrc"]);
        assert_eq!(cfg.limits.max_symbols_per_file, 10);
        assert_eq!(cfg.chunking.chunk_overlap, 0);
        assert!(!cfg.resolve_references);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_serde_yaml_roundtrip() {
        let cfg = valid();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: BuildConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test_case(|c: &mut BuildConfig| c.repo_id.clear() ; "empty repo id")]
    #[test_case(|c: &mut BuildConfig| c.chunking.chunk_overlap = 1000 ; "overlap equals size")]
    #[test_case(|c: &mut BuildConfig| c.chunking.chunk_size = 0 ; "zero chunk size")]
    #[test_case(|c: &mut BuildConfig| c.limits.symbol_batch_size = 0 ; "zero batch size")]
    #[test_case(
        |c: &mut BuildConfig| c.limits.max_file_size_bytes = 20_000_000 ;
        "direct limit above ceiling"
    )]
    fn invalid_config_is_rejected(mutate: fn(&mut BuildConfig)) {
        let mut cfg = valid();
        mutate(&mut cfg);
        assert!(matches!(cfg.validate(), Err(RepoGraphError::Config(_))));
    }
}
