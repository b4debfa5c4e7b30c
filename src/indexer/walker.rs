//! Repository traversal.
//!
//! Produces a flat, pre-order list of directories and files under the
//! repository root. Each entry remembers the index of its parent directory
//! entry (`None` for direct children of the root), which is all the
//! assembler needs to emit `CONTAINS_PATH` edges.
//!
//! Ordering is deterministic: within a directory, subdirectories come first,
//! then files, each group sorted case-insensitively (exact name breaks
//! ties). Hidden and excluded entries are counted but never returned.
//! Symlinks are followed; a directory whose canonical path was already
//! visited is reported and not descended again.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::config::ExcludeConfig;
use crate::error::{RepoGraphError, Result};
use crate::types::{BuildStats, IndexErrorKind};

// ---------------------------------------------------------------------------
// Exclusion policy
// ---------------------------------------------------------------------------

/// Compiled exclusion rules. Names match case-insensitively; `*` and `?`
/// work as shell wildcards.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    dirs: Vec<Regex>,
    files: Vec<Regex>,
    allowed_hidden: HashSet<String>,
}

impl ExclusionPolicy {
    pub fn from_config(config: &ExcludeConfig) -> Result<Self> {
        Ok(Self {
            dirs: compile_patterns(&config.dirs)?,
            files: compile_patterns(&config.files)?,
            allowed_hidden: config
                .allowed_hidden
                .iter()
                .map(|n| n.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Dot-prefixed and not explicitly allowed.
    pub fn is_hidden(&self, name: &str) -> bool {
        name.starts_with('.') && !self.allowed_hidden.contains(&name.to_ascii_lowercase())
    }

    pub fn skips_dir(&self, name: &str) -> bool {
        self.is_hidden(name) || self.dirs.iter().any(|re| re.is_match(name))
    }

    pub fn skips_file(&self, name: &str) -> bool {
        self.is_hidden(name) || self.files.iter().any(|re| re.is_match(name))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            let body = regex::escape(p).replace(r"\*", ".*").replace(r"\?", ".");
            Regex::new(&format!("(?i)^{body}$"))
                .map_err(|e| RepoGraphError::Config(format!("bad exclusion pattern `{p}`: {e}")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Walk output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One emitted directory or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub kind: EntryKind,
    pub basename: String,
    /// `/`-separated, relative to the root.
    pub relative_path: String,
    pub abs_path: PathBuf,
    /// Index of the parent directory entry; `None` under the root.
    pub parent: Option<usize>,
    /// File size in bytes; 0 for directories.
    pub size: u64,
}

/// `/`-joined path of `path` below `root`.
pub fn relative_path_of(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn sort_key(entry: &DirEntry) -> (bool, String) {
    (
        !entry.file_type().is_dir(),
        entry.file_name().to_string_lossy().to_lowercase(),
    )
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    sort_key(a)
        .cmp(&sort_key(b))
        .then_with(|| a.file_name().cmp(b.file_name()))
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RepositoryWalker {
    policy: ExclusionPolicy,
}

impl RepositoryWalker {
    pub fn new(policy: ExclusionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Walk everything under `root`. Traversal counters and per-entry faults
    /// go into `stats`; the caller has already checked that `root` exists.
    pub fn walk(&self, root: &Path, stats: &mut BuildStats) -> Vec<WalkEntry> {
        let mut entries: Vec<WalkEntry> = Vec::new();
        // dir_stack[d] = entry index of the open directory at depth d.
        let mut dir_stack: Vec<Option<usize>> = vec![None];
        let mut visited: HashSet<PathBuf> = HashSet::new();
        if let Ok(canonical_root) = root.canonicalize() {
            visited.insert(canonical_root);
        }

        let mut it = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by(compare_entries)
            .into_iter();

        while let Some(next) = it.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_walk_error(root, &err, stats);
                    continue;
                }
            };

            let depth = entry.depth();
            dir_stack.truncate(depth);
            let parent = dir_stack.last().copied().flatten();
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative_path = relative_path_of(root, entry.path());

            if entry.file_type().is_dir() {
                if self.policy.skips_dir(&name) {
                    tracing::debug!(path = %relative_path, "excluded directory");
                    stats.skipped_directories += 1;
                    it.skip_current_dir();
                    continue;
                }
                if let Ok(canonical) = entry.path().canonicalize() {
                    if !visited.insert(canonical) {
                        tracing::warn!(
                            path = %relative_path,
                            "directory already visited through a symlink"
                        );
                        stats.record_error(
                            relative_path,
                            IndexErrorKind::FileSystem,
                            "symlink cycle, directory not descended",
                        );
                        stats.skipped_directories += 1;
                        it.skip_current_dir();
                        continue;
                    }
                }

                stats.total_directories += 1;
                entries.push(WalkEntry {
                    kind: EntryKind::Directory,
                    basename: name,
                    relative_path,
                    abs_path: entry.path().to_path_buf(),
                    parent,
                    size: 0,
                });
                dir_stack.push(Some(entries.len() - 1));
                continue;
            }

            stats.total_files += 1;
            if self.policy.skips_file(&name) {
                tracing::debug!(path = %relative_path, "excluded file");
                stats.skipped_files += 1;
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(err) => {
                    stats.skipped_files += 1;
                    stats.record_error(relative_path, IndexErrorKind::FileSystem, err.to_string());
                    continue;
                }
            };
            entries.push(WalkEntry {
                kind: EntryKind::File,
                basename: name,
                relative_path,
                abs_path: entry.path().to_path_buf(),
                parent,
                size,
            });
        }

        entries
    }

    /// Record an entry walkdir could not yield.
    ///
    /// Directories that fail to open were already emitted, and symlink loops
    /// only ever point at directories. Anything else is a file entry that
    /// could not be inspected (a dangling link, or one removed mid-walk), so
    /// it is counted as a skipped file.
    fn record_walk_error(&self, root: &Path, err: &walkdir::Error, stats: &mut BuildStats) {
        let path = err
            .path()
            .map(|p| relative_path_of(root, p))
            .unwrap_or_default();
        let message = if err.loop_ancestor().is_some() {
            "symlink cycle, directory not descended".to_string()
        } else {
            err.to_string()
        };
        let is_dir = err.loop_ancestor().is_some() || err.path().is_some_and(|p| p.is_dir());
        if !is_dir {
            stats.total_files += 1;
            stats.skipped_files += 1;
        }
        tracing::warn!(path = %path, error = %message, "skipping unreadable entry");
        stats.record_error(path, IndexErrorKind::FileSystem, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn walker() -> RepositoryWalker {
        RepositoryWalker::new(ExclusionPolicy::from_config(&ExcludeConfig::default()).unwrap())
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/utils")).unwrap();
        fs::create_dir_all(root.join("Docs")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("foo.egg-info")).unwrap();
        fs::write(root.join("b.py"), "x = 1\n").unwrap();
        fs::write(root.join("A.md"), "# A\n").unwrap();
        fs::write(root.join(".gitignore"), "target\n").unwrap();
        fs::write(root.join(".env"), "KEY=1\n").unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::write(root.join("src/main.py"), "pass\n").unwrap();
        fs::write(root.join("src/utils/helpers.py"), "pass\n").unwrap();
        fs::write(root.join("Docs/guide.md"), "guide\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        dir
    }

    #[test]
    fn preorder_dirs_first_case_insensitive() {
        let dir = setup();
        let mut stats = BuildStats::default();
        let entries = walker().walk(dir.path(), &mut stats);
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "Docs",
                "Docs/guide.md",
                "src",
                "src/utils",
                "src/utils/helpers.py",
                "src/main.py",
                ".env",
                "A.md",
                "b.py",
            ]
        );
    }

    #[test]
    fn parents_point_at_directory_entries() {
        let dir = setup();
        let mut stats = BuildStats::default();
        let entries = walker().walk(dir.path(), &mut stats);
        let by_path = |p: &str| entries.iter().position(|e| e.relative_path == p).unwrap();
        assert_eq!(entries[by_path("Docs")].parent, None);
        assert_eq!(entries[by_path("src/utils/helpers.py")].parent, Some(by_path("src/utils")));
        assert_eq!(entries[by_path("src/main.py")].parent, Some(by_path("src")));
        assert_eq!(entries[by_path("b.py")].parent, None);
    }

    #[test]
    fn skipped_entries_are_counted() {
        let dir = setup();
        let mut stats = BuildStats::default();
        walker().walk(dir.path(), &mut stats);
        // .gitignore and package-lock.json
        assert_eq!(stats.skipped_files, 2);
        assert_eq!(stats.total_files, 8);
        // node_modules, .git, foo.egg-info
        assert_eq!(stats.skipped_directories, 3);
        assert_eq!(stats.total_directories, 3);
        assert!(stats.errors.is_empty());
    }

    #[test]
    fn file_sizes_are_recorded() {
        let dir = setup();
        let mut stats = BuildStats::default();
        let entries = walker().walk(dir.path(), &mut stats);
        let b = entries.iter().find(|e| e.relative_path == "b.py").unwrap();
        assert_eq!(b.size, 6);
        assert_eq!(b.kind, EntryKind::File);
    }

    #[test]
    fn exclusion_globs_are_case_insensitive() {
        let policy = ExclusionPolicy::from_config(&ExcludeConfig {
            dirs: vec!["*.egg-info".into(), "Build".into()],
            files: vec!["*.min.js".into(), "yarn.lock".into()],
            allowed_hidden: vec![".env".into()],
        })
        .unwrap();
        assert!(policy.skips_dir("widgets.EGG-INFO"));
        assert!(policy.skips_dir("build"));
        assert!(!policy.skips_dir("builder"));
        assert!(policy.skips_file("app.min.js"));
        assert!(policy.skips_file("YARN.LOCK"));
        assert!(policy.skips_file(".gitignore"));
        assert!(!policy.skips_file(".env"));
        assert!(!policy.skips_file("app.js"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_reported_not_followed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a/f.py"), "pass\n").unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("a/loop")).unwrap();

        let mut stats = BuildStats::default();
        let entries = walker().walk(root, &mut stats);
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a", "a/f.py"]);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].kind, IndexErrorKind::FileSystem);
        assert!(stats.errors[0].message.contains("symlink cycle"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_skipped_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.py"), "pass\n").unwrap();
        std::os::unix::fs::symlink(root.join("gone.py"), root.join("dangling.py")).unwrap();

        let mut stats = BuildStats::default();
        let entries = walker().walk(root, &mut stats);
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.py"]);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].path, "dangling.py");
        assert_eq!(stats.errors[0].kind, IndexErrorKind::FileSystem);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_isolated() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::write(root.join("locked/inner.py"), "pass\n").unwrap();
        fs::write(root.join("ok.py"), "pass\n").unwrap();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(root.join("locked")).is_ok() {
            // Permission bits do not bind this user (e.g. root).
            fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut stats = BuildStats::default();
        let entries = walker().walk(root, &mut stats);
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["locked", "ok.py"]);
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.skipped_files, 0);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].path, "locked");
        assert_eq!(stats.errors[0].kind, IndexErrorKind::FileSystem);
    }
}
