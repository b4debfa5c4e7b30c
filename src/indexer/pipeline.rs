//! Graph assembly.
//!
//! A build runs in two phases:
//!
//! 1. **Per-file work** (parallel, rayon). Every file entry is classified,
//!    read, parsed, truncated, resolved into a hierarchy and given
//!    identities, or chunked. The result is a [`FileGraph`]: payloads and
//!    edges addressed by *local* indices, where 0 is the file node itself.
//! 2. **Emission** (sequential). Entries are replayed in walk pre-order and
//!    each step takes the next free node id and returns the one after the
//!    nodes it emitted. Local indices become global ids by offset, so the
//!    ids are exactly those of a one-thread build.
//!
//! Per-file faults end up in [`BuildStats::errors`]; only a missing root or
//! cancellation aborts the build.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::BuildConfig;
use crate::error::{RepoGraphError, Result};
use crate::indexer::chunker::TextChunker;
use crate::indexer::classifier::{classify, FileRoute, SkipReason};
use crate::indexer::extractor::{ExtractorRegistry, FileReferences, RawSymbol, SymbolExtractor};
use crate::indexer::hierarchy::{self, Span};
use crate::indexer::identity::{self, VersionKey};
use crate::indexer::linker::{self, LinkFile, LinkSymbol};
use crate::indexer::parser::CodeParser;
use crate::indexer::walker::{EntryKind, ExclusionPolicy, RepositoryWalker, WalkEntry};
use crate::types::{
    BuildResult, BuildStats, EdgeKind, FileEntry, GraphEdge, GraphNode, IndexErrorKind, Language,
    NodePayload, SymbolEntry,
};

/// Node id of the repository root.
pub const ROOT_ID: &str = "0";

// ---------------------------------------------------------------------------
// Per-file result
// ---------------------------------------------------------------------------

/// One file's contribution, before global ids exist.
#[derive(Debug, Default)]
struct FileGraph {
    /// False when the file gets no node at all.
    indexed: bool,
    /// Symbol or text payloads; local index `i + 1`.
    payloads: Vec<NodePayload>,
    /// `(source, target, kind)` over local indices.
    edges: Vec<(usize, usize, EdgeKind)>,
    references: Option<(Language, FileReferences)>,
    stats: BuildStats,
}

impl FileGraph {
    fn skipped(stats: BuildStats) -> Self {
        Self {
            stats,
            ..Self::default()
        }
    }

    fn bare(stats: BuildStats) -> Self {
        Self {
            indexed: true,
            stats,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Owns everything emitted so far. The id counter is *not* stored here; it
/// is threaded through each `emit_*` call by value.
struct Assembly {
    root: GraphNode,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    stats: BuildStats,
    link_files: Vec<LinkFile>,
}

impl Assembly {
    fn new(root: GraphNode, stats: BuildStats) -> Self {
        Self {
            nodes: vec![root.clone()],
            root,
            edges: Vec::new(),
            stats,
            link_files: Vec::new(),
        }
    }

    fn emit_directory(
        &mut self,
        basename: &str,
        relative_path: &str,
        parent_id: &str,
        next_id: u64,
    ) -> (String, u64) {
        let node = GraphNode::new(
            next_id,
            NodePayload::File(FileEntry {
                basename: basename.to_string(),
                relative_path: relative_path.to_string(),
            }),
        );
        let id = node.node_id.clone();
        self.edges
            .push(GraphEdge::new(parent_id, id.as_str(), EdgeKind::ContainsPath));
        self.nodes.push(node);
        (id, next_id + 1)
    }

    /// Emit a file node and its subgraph. Returns the file's id (if it was
    /// indexed) and the next free id.
    fn emit_file(
        &mut self,
        basename: &str,
        relative_path: &str,
        parent_id: &str,
        graph: FileGraph,
        next_id: u64,
    ) -> (Option<String>, u64) {
        let FileGraph {
            indexed,
            payloads,
            edges,
            references,
            stats,
        } = graph;
        self.stats.merge(stats);
        if !indexed {
            return (None, next_id);
        }

        let (file_id, mut next) = self.emit_directory(basename, relative_path, parent_id, next_id);
        let first = self.nodes.len();
        for payload in payloads {
            self.nodes.push(GraphNode::new(next, payload));
            next += 1;
        }
        let global = |local: usize| (next_id + local as u64).to_string();
        let mut nested: HashSet<usize> = HashSet::new();
        for (source, target, kind) in edges {
            if kind == EdgeKind::ContainsSymbol {
                nested.insert(target);
            }
            self.edges.push(GraphEdge::new(global(source), global(target), kind));
        }

        if let Some((language, references)) = references {
            let symbols = self.nodes[first..]
                .iter()
                .enumerate()
                .filter_map(|(i, node)| {
                    node.as_symbol().map(|s| LinkSymbol {
                        node_id: node.node_id.clone(),
                        name: s.name.clone(),
                        qualified_name: s.qualified_name.clone(),
                        start_line: s.start_line,
                        end_line: s.end_line,
                        top_level: !nested.contains(&(i + 1)),
                    })
                })
                .collect();
            self.link_files.push(LinkFile {
                node_id: file_id.clone(),
                relative_path: relative_path.to_string(),
                language,
                symbols,
                references,
            });
        }

        (Some(file_id), next)
    }

    /// Emit any directory of `relative_path` not emitted yet, root first.
    /// Returns the id of the file's parent directory and the next free id.
    fn ensure_directory_chain(
        &mut self,
        relative_path: &str,
        dir_ids: &mut HashMap<String, String>,
        next_id: u64,
    ) -> (String, u64) {
        let mut parent = ROOT_ID.to_string();
        let mut next = next_id;
        let mut prefix = String::new();
        let segments: Vec<&str> = relative_path.split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            parent = match dir_ids.get(&prefix) {
                Some(id) => id.clone(),
                None => {
                    let (id, after) = self.emit_directory(segment, &prefix, &parent, next);
                    next = after;
                    self.stats.total_directories += 1;
                    dir_ids.insert(prefix.clone(), id.clone());
                    id
                }
            };
        }
        (parent, next)
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

/// Builds one [`BuildResult`] per call for a `(repo_id, commit_sha)` pair.
pub struct GraphBuilder {
    config: BuildConfig,
    walker: RepositoryWalker,
    parser: CodeParser,
    registry: ExtractorRegistry,
    chunker: TextChunker,
    cancel: Option<Arc<AtomicBool>>,
}

impl GraphBuilder {
    /// Validates `config` and compiles its exclusion rules.
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        let policy = ExclusionPolicy::from_config(&config.exclude)?;
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        Ok(Self {
            walker: RepositoryWalker::new(policy),
            parser: CodeParser::new(),
            registry: ExtractorRegistry::default(),
            chunker,
            cancel: None,
            config,
        })
    }

    /// Replace the adapter set.
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Stop between files once `flag` is set; the build then returns
    /// [`RepoGraphError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn checked_root(&self) -> Result<PathBuf> {
        let root = &self.config.repo_root;
        if !root.is_dir() || std::fs::read_dir(root).is_err() {
            return Err(RepoGraphError::RootNotFound(root.clone()));
        }
        Ok(root.clone())
    }

    /// Index the whole repository.
    pub fn build(&self) -> Result<BuildResult> {
        let started = Instant::now();
        let root = self.checked_root()?;
        tracing::info!(
            repo_id = %self.config.repo_id,
            commit = %self.config.commit_sha,
            root = %root.display(),
            "building graph"
        );

        let mut stats = BuildStats::default();
        let entries = self.walker.walk(&root, &mut stats);
        let graphs = self.process_entries(&entries)?;

        let mut asm = Assembly::new(root_node(&root), stats);
        let mut next_id: u64 = 1;
        let mut entry_ids: Vec<Option<String>> = Vec::with_capacity(entries.len());

        for (entry, graph) in entries.iter().zip(graphs) {
            let parent_id = entry
                .parent
                .and_then(|p| entry_ids[p].clone())
                .unwrap_or_else(|| ROOT_ID.to_string());
            let (id, next) = match (entry.kind, graph) {
                (EntryKind::Directory, _) => {
                    let (id, next) = asm.emit_directory(
                        &entry.basename,
                        &entry.relative_path,
                        &parent_id,
                        next_id,
                    );
                    (Some(id), next)
                }
                (EntryKind::File, Some(graph)) => asm.emit_file(
                    &entry.basename,
                    &entry.relative_path,
                    &parent_id,
                    graph,
                    next_id,
                ),
                (EntryKind::File, None) => (None, next_id),
            };
            entry_ids.push(id);
            next_id = next;
        }

        Ok(self.finish(asm, started))
    }

    /// Index only `paths` (repo-relative files), plus the directories that
    /// lead to them. Ids follow the order of `paths`.
    pub fn build_for_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<BuildResult> {
        let started = Instant::now();
        let root = self.checked_root()?;
        let policy = self.walker.policy();

        let mut stats = BuildStats::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries: Vec<WalkEntry> = Vec::new();

        for requested in paths {
            let requested = requested.as_ref();
            let Some(relative_path) = normalize_request(requested) else {
                stats.total_files += 1;
                stats.skipped_files += 1;
                stats.record_error(
                    requested,
                    IndexErrorKind::FileSystem,
                    "path is absolute or escapes the repository root",
                );
                continue;
            };
            if !seen.insert(relative_path.clone()) {
                continue;
            }
            stats.total_files += 1;

            let segments: Vec<&str> = relative_path.split('/').collect();
            let (basename, dirs) = match segments.split_last() {
                Some((last, dirs)) => (last.to_string(), dirs),
                None => continue,
            };
            if dirs.iter().any(|d| policy.skips_dir(d)) || policy.skips_file(&basename) {
                stats.skipped_files += 1;
                continue;
            }

            let abs_path = root.join(&relative_path);
            match std::fs::metadata(&abs_path) {
                Ok(meta) if meta.is_file() => entries.push(WalkEntry {
                    kind: EntryKind::File,
                    basename,
                    relative_path,
                    abs_path,
                    parent: None,
                    size: meta.len(),
                }),
                Ok(_) => {
                    stats.skipped_files += 1;
                    stats.record_error(
                        relative_path,
                        IndexErrorKind::FileSystem,
                        "not a regular file",
                    );
                }
                Err(err) => {
                    stats.skipped_files += 1;
                    stats.record_error(relative_path, IndexErrorKind::FileSystem, err.to_string());
                }
            }
        }

        let graphs = self.process_entries(&entries)?;
        let mut asm = Assembly::new(root_node(&root), stats);
        let mut dir_ids: HashMap<String, String> = HashMap::new();
        let mut next_id: u64 = 1;

        for (entry, graph) in entries.iter().zip(graphs) {
            let Some(graph) = graph else { continue };
            if !graph.indexed {
                asm.stats.merge(graph.stats);
                continue;
            }
            let (parent_id, next) =
                asm.ensure_directory_chain(&entry.relative_path, &mut dir_ids, next_id);
            let (_, next) = asm.emit_file(
                &entry.basename,
                &entry.relative_path,
                &parent_id,
                graph,
                next,
            );
            next_id = next;
        }

        Ok(self.finish(asm, started))
    }

    fn process_entries(&self, entries: &[WalkEntry]) -> Result<Vec<Option<FileGraph>>> {
        entries
            .par_iter()
            .map(|entry| match entry.kind {
                EntryKind::Directory => Ok(None),
                EntryKind::File => {
                    if self.is_cancelled() {
                        return Err(RepoGraphError::Cancelled);
                    }
                    Ok(Some(self.process_file(entry)))
                }
            })
            .collect()
    }

    fn finish(&self, mut asm: Assembly, started: Instant) -> BuildResult {
        if self.config.resolve_references && !asm.link_files.is_empty() {
            let linked = linker::link(&asm.link_files);
            asm.stats.imports_resolved += linked.imports_resolved;
            asm.stats.calls_resolved += linked.calls_resolved;
            asm.edges.extend(linked.edges);
        }

        let stats = asm.stats;
        tracing::info!(
            repo_id = %self.config.repo_id,
            commit = %self.config.commit_sha,
            nodes = asm.nodes.len(),
            edges = asm.edges.len(),
            indexed_files = stats.indexed_files,
            skipped_files = stats.skipped_files,
            failed_files = stats.failed_files,
            total_symbols = stats.total_symbols,
            total_text_chunks = stats.total_text_chunks,
            errors = stats.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "graph build complete"
        );

        BuildResult {
            root_node: asm.root,
            nodes: asm.nodes,
            edges: asm.edges,
            stats,
        }
    }

    // -----------------------------------------------------------------------
    // Per-file pipelines
    // -----------------------------------------------------------------------

    fn process_file(&self, entry: &WalkEntry) -> FileGraph {
        let started = Instant::now();
        let mut stats = BuildStats::default();
        let path = entry.relative_path.as_str();

        let graph = match classify(path, entry.size, &self.config.limits) {
            FileRoute::Skip(SkipReason::TooLarge { size, limit }) => {
                tracing::warn!(path, size, limit, "file above size ceiling, skipped");
                stats.skipped_files += 1;
                stats.record_error(
                    path,
                    IndexErrorKind::SizeLimitExceeded,
                    RepoGraphError::SizeLimitExceeded {
                        path: path.to_string(),
                        size,
                        limit,
                    }
                    .to_string(),
                );
                FileGraph::skipped(stats)
            }
            FileRoute::Skip(SkipReason::Unrecognized) => {
                stats.skipped_files += 1;
                FileGraph::skipped(stats)
            }
            FileRoute::Text => self.process_text(entry, stats),
            FileRoute::Code { language, batched } => {
                self.process_code(entry, language, batched, stats)
            }
        };

        tracing::debug!(
            path,
            nodes = graph.payloads.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "file processed"
        );
        graph
    }

    fn unreadable(entry: &WalkEntry, err: std::io::Error, mut stats: BuildStats) -> FileGraph {
        tracing::warn!(path = %entry.relative_path, error = %err, "cannot read file");
        stats.skipped_files += 1;
        stats.record_error(&entry.relative_path, IndexErrorKind::FileSystem, err.to_string());
        FileGraph::skipped(stats)
    }

    fn process_text(&self, entry: &WalkEntry, mut stats: BuildStats) -> FileGraph {
        let bytes = match std::fs::read(&entry.abs_path) {
            Ok(bytes) => bytes,
            Err(err) => return Self::unreadable(entry, err, stats),
        };
        let content = String::from_utf8_lossy(&bytes);
        let chunks = self.chunker.chunk(&content);

        stats.indexed_files += 1;
        stats.total_text_chunks += chunks.len();
        let mut graph = FileGraph::bare(stats);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let local = i + 1;
            graph.payloads.push(NodePayload::Text(chunk));
            graph.edges.push((0, local, EdgeKind::ContainsText));
            if i > 0 {
                graph.edges.push((local - 1, local, EdgeKind::NextChunk));
            }
        }
        graph
    }

    fn process_code(
        &self,
        entry: &WalkEntry,
        language: Language,
        batched: bool,
        mut stats: BuildStats,
    ) -> FileGraph {
        let path = entry.relative_path.as_str();
        let adapter = match self.registry.get(language) {
            Some(adapter) if CodeParser::can_parse(language) => adapter,
            _ => {
                tracing::debug!(path, %language, "no extraction adapter, file node only");
                stats.indexed_files += 1;
                return FileGraph::bare(stats);
            }
        };

        let source = match std::fs::read(&entry.abs_path) {
            Ok(source) => source,
            Err(err) => return Self::unreadable(entry, err, stats),
        };
        stats.indexed_files += 1;

        let (mut raw, references) = match self.extract(adapter, language, path, source) {
            Ok(extracted) => extracted,
            Err(err) => {
                tracing::warn!(
                    path,
                    adapter = adapter.name(),
                    error = %err,
                    "symbol extraction failed"
                );
                stats.failed_files += 1;
                stats.record_error(path, IndexErrorKind::Extraction, err.to_string());
                return FileGraph::bare(stats);
            }
        };

        let cap = self.config.limits.max_symbols_per_file;
        if raw.len() > cap {
            let dropped = raw.len() - cap;
            tracing::warn!(path, dropped, cap, "symbol cap reached, truncating");
            raw.truncate(cap);
            stats.truncated_symbols += dropped;
        }

        let spans: Vec<Span> = raw
            .iter()
            .map(|s| Span::new(s.start_line, s.end_line))
            .collect();
        let resolved = hierarchy::resolve(&spans);
        if resolved.violations > 0 {
            stats.hierarchy_violations += resolved.violations;
            stats.record_error(
                path,
                IndexErrorKind::HierarchyInvariantViolation,
                format!(
                    "{} symbol span(s) not strictly nested in their enclosing span",
                    resolved.violations
                ),
            );
        }

        let count = raw.len();
        stats.total_symbols += count;
        let mut payloads = Vec::with_capacity(count);
        if batched {
            stats.large_files_batched += 1;
            let batch_size = self.config.limits.symbol_batch_size;
            let mut remaining = raw.into_iter();
            loop {
                let batch: Vec<RawSymbol> = remaining.by_ref().take(batch_size).collect();
                if batch.is_empty() {
                    break;
                }
                stats.symbol_batches_processed += 1;
                payloads.extend(
                    batch
                        .into_iter()
                        .map(|r| NodePayload::Symbol(self.symbol_entry(r, language, path))),
                );
                tracing::debug!(
                    path,
                    batch = stats.symbol_batches_processed,
                    emitted = payloads.len(),
                    "symbol batch processed"
                );
            }
        } else {
            payloads.extend(
                raw.into_iter()
                    .map(|r| NodePayload::Symbol(self.symbol_entry(r, language, path))),
            );
        }

        let mut graph = FileGraph::bare(stats);
        graph.payloads = payloads;
        graph.edges = (1..=count)
            .map(|i| (0, i, EdgeKind::DefinesSymbol))
            .chain(
                resolved
                    .edges
                    .into_iter()
                    .map(|(parent, child)| (parent + 1, child + 1, EdgeKind::ContainsSymbol)),
            )
            .collect();
        graph.references = references.map(|r| (language, r));
        graph
    }

    /// Parse and extract. `source` and the tree are dropped on return.
    fn extract(
        &self,
        adapter: &dyn SymbolExtractor,
        language: Language,
        path: &str,
        source: Vec<u8>,
    ) -> Result<(Vec<RawSymbol>, Option<FileReferences>)> {
        let tree = self
            .parser
            .parse(&source, language)
            .map_err(|e| RepoGraphError::Extraction {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        let symbols = adapter.extract_symbols(&tree, path, &source)?;
        let references = self
            .config
            .resolve_references
            .then(|| adapter.extract_references(&tree, &source));
        Ok((symbols, references))
    }

    fn symbol_entry(&self, raw: RawSymbol, language: Language, path: &str) -> SymbolEntry {
        let fingerprint = identity::fingerprint(&raw.node_types);
        let version_id = identity::version_id(&VersionKey {
            commit_sha: &self.config.commit_sha,
            relative_path: path,
            kind: raw.kind,
            name: &raw.name,
            qualified_name: raw.qualified_name.as_deref(),
            start_line: raw.start_line,
            end_line: raw.end_line,
        });
        let stable_id = identity::stable_id(
            &self.config.repo_id,
            raw.kind,
            raw.qualified_name.as_deref(),
            fingerprint.as_deref(),
            &raw.name,
        );
        SymbolEntry {
            kind: raw.kind,
            name: raw.name,
            qualified_name: raw.qualified_name,
            language,
            relative_path: path.to_string(),
            start_line: raw.start_line,
            end_line: raw.end_line,
            start_byte: raw.start_byte,
            end_byte: raw.end_byte,
            signature: raw.signature,
            docstring: raw.docstring,
            node_types: raw.node_types,
            version_id,
            stable_id,
            fingerprint,
        }
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("repo_id", &self.config.repo_id)
            .field("commit_sha", &self.config.commit_sha)
            .field("repo_root", &self.config.repo_root)
            .field("registry", &self.registry)
            .finish()
    }
}

fn root_node(root: &Path) -> GraphNode {
    let basename = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "root".to_string());
    GraphNode::new(
        0,
        NodePayload::File(FileEntry {
            basename,
            relative_path: ".".to_string(),
        }),
    )
}

/// Clean a caller-supplied relative path; `None` if it is absolute or
/// climbs out of the root.
fn normalize_request(raw: &str) -> Option<String> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || Path::new(raw).is_absolute() {
        return None;
    }
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
