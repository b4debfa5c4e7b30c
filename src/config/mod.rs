//! Build configuration: schema plus YAML loading.

pub mod schema;

use std::path::Path;

pub use schema::{BuildConfig, ChunkingConfig, ExcludeConfig, LimitsConfig};

use crate::error::{RepoGraphError, Result};

impl BuildConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: BuildConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML config file without validating it, so callers can fill
    /// in `repo_id` / `commit_sha` before the builder checks the result.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RepoGraphError::Config(format!(
                "no config file at {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_reads_and_validates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repograph.yaml");
        let yaml = concat!(
            "repo_id: r1\n",
            "commit_sha: c1\n",
            "chunking:\n",
            "  chunk_size: 50\n",
            "  chunk_overlap: 10\n",
        );
        std::fs::write(&path, yaml).unwrap();
        let cfg = BuildConfig::load(&path).unwrap();
        assert_eq!(cfg.repo_id, "r1");
        assert_eq!(cfg.chunking.chunk_size, 50);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = BuildConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, RepoGraphError::Config(_)));
    }

    #[test]
    fn invalid_values_fail_validation_on_load() {
        let yaml = "repo_id: r1\nchunking:\n  chunk_size: 10\n  chunk_overlap: 10\n";
        let err = BuildConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn read_leaves_identity_to_the_caller() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repograph.yaml");
        std::fs::write(&path, "limits:\n  max_symbols_per_file: 7\n").unwrap();
        let cfg = BuildConfig::read(&path).unwrap();
        assert!(cfg.repo_id.is_empty());
        assert_eq!(cfg.limits.max_symbols_per_file, 7);
        assert!(BuildConfig::load(&path).is_err());
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let err = BuildConfig::from_yaml_str("repo_id: [unterminated").unwrap_err();
        assert!(matches!(err, RepoGraphError::Config(_)));
    }
}
