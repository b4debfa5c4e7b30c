//! Best-effort `IMPORTS` and `CALLS` edges.
//!
//! Runs once after assembly over every indexed code file. Nothing here is
//! type-aware: imports resolve by path convention, calls by name through
//! the file's import bindings. A reference that cannot be pinned to exactly
//! one target produces no edge.

use std::collections::{HashMap, HashSet};

use crate::indexer::extractor::{CallSite, FileReferences, ImportRef};
use crate::types::{EdgeKind, GraphEdge, Language};

/// Extensions tried for ECMAScript specifiers without one.
const ECMA_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];

/// A symbol node as the linker sees it.
#[derive(Debug, Clone)]
pub struct LinkSymbol {
    pub node_id: String,
    pub name: String,
    pub qualified_name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    /// No `CONTAINS_SYMBOL` parent.
    pub top_level: bool,
}

impl LinkSymbol {
    fn key(&self) -> &str {
        self.qualified_name.as_deref().unwrap_or(&self.name)
    }
}

/// One indexed code file with its symbols and raw references.
#[derive(Debug, Clone)]
pub struct LinkFile {
    pub node_id: String,
    pub relative_path: String,
    pub language: Language,
    pub symbols: Vec<LinkSymbol>,
    pub references: FileReferences,
}

#[derive(Debug, Clone, Default)]
pub struct Linked {
    pub edges: Vec<GraphEdge>,
    pub imports_resolved: usize,
    pub calls_resolved: usize,
}

/// What a local name refers to after imports are resolved.
#[derive(Debug, Clone)]
enum Binding {
    Module(usize),
    Symbol(usize, String),
}

#[derive(Default)]
struct FileIndex {
    by_key: HashMap<String, usize>,
    top_level: HashMap<String, Vec<usize>>,
}

impl FileIndex {
    fn build(file: &LinkFile) -> Self {
        let mut index = Self::default();
        for (i, sym) in file.symbols.iter().enumerate() {
            index.by_key.entry(sym.key().to_string()).or_insert(i);
            if sym.top_level {
                index.top_level.entry(sym.name.clone()).or_default().push(i);
            }
        }
        index
    }

    fn unique_top_level(&self, name: &str) -> Option<usize> {
        match self.top_level.get(name).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            _ => None,
        }
    }
}

/// Resolve every file's references against the rest of the build.
pub fn link(files: &[LinkFile]) -> Linked {
    let by_path: HashMap<&str, usize> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.relative_path.as_str(), i))
        .collect();
    let by_suffix = python_suffixes(files);
    let indexes: Vec<FileIndex> = files.iter().map(FileIndex::build).collect();
    let resolver = Resolver {
        files,
        by_path: &by_path,
        by_suffix: &by_suffix,
    };

    let mut linked = Linked::default();
    let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
    let mut push = |edges: &mut Vec<GraphEdge>, source: &str, target: &str, kind: EdgeKind| {
        if seen.insert((source.to_string(), target.to_string(), kind)) {
            edges.push(GraphEdge::new(source, target, kind));
            true
        } else {
            false
        }
    };

    for (file_idx, file) in files.iter().enumerate() {
        if file.references.is_empty() {
            continue;
        }
        let mut bindings: HashMap<String, Binding> = HashMap::new();
        let mut wildcards: Vec<usize> = Vec::new();
        for import in &file.references.imports {
            for target in resolver.bind(file, import, &mut bindings, &mut wildcards) {
                if target != file_idx
                    && push(
                        &mut linked.edges,
                        &file.node_id,
                        &files[target].node_id,
                        EdgeKind::Imports,
                    )
                {
                    linked.imports_resolved += 1;
                }
            }
        }

        let calls = CallContext {
            files,
            indexes: &indexes,
            file_idx,
            bindings: &bindings,
            wildcards: &wildcards,
        };
        for call in &file.references.calls {
            let Some(caller) = enclosing_symbol(&file.symbols, call.line) else {
                continue;
            };
            let Some((target_file, target_sym)) = calls.resolve(call, caller) else {
                continue;
            };
            let source_id = &file.symbols[caller].node_id;
            let target_id = &files[target_file].symbols[target_sym].node_id;
            if source_id != target_id
                && push(&mut linked.edges, source_id, target_id, EdgeKind::Calls)
            {
                linked.calls_resolved += 1;
            }
        }
    }

    tracing::debug!(
        imports = linked.imports_resolved,
        calls = linked.calls_resolved,
        "reference linking complete"
    );
    linked
}

/// Innermost symbol whose span covers `line`.
fn enclosing_symbol(symbols: &[LinkSymbol], line: u32) -> Option<usize> {
    symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| s.start_line <= line && line <= s.end_line)
        .min_by_key(|(_, s)| s.end_line - s.start_line)
        .map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

struct Resolver<'a> {
    files: &'a [LinkFile],
    by_path: &'a HashMap<&'a str, usize>,
    /// Python files keyed by every proper path suffix (`a/b.py` and `b.py`
    /// for `src/a/b.py`).
    by_suffix: &'a HashMap<&'a str, Vec<usize>>,
}

fn python_suffixes(files: &[LinkFile]) -> HashMap<&str, Vec<usize>> {
    let mut by_suffix: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, file) in files.iter().enumerate() {
        if file.language != Language::Python {
            continue;
        }
        let path = file.relative_path.as_str();
        for (slash, _) in path.match_indices('/') {
            by_suffix.entry(&path[slash + 1..]).or_default().push(idx);
        }
    }
    by_suffix
}

impl Resolver<'_> {
    /// Record the bindings `import` introduces; returns the files it pulls in.
    fn bind(
        &self,
        file: &LinkFile,
        import: &ImportRef,
        bindings: &mut HashMap<String, Binding>,
        wildcards: &mut Vec<usize>,
    ) -> Vec<usize> {
        if file.language == Language::Python {
            self.bind_python(file, import, bindings, wildcards)
        } else if file.language.is_ecmascript() {
            self.bind_ecmascript(file, import, bindings)
        } else {
            Vec::new()
        }
    }

    fn bind_python(
        &self,
        file: &LinkFile,
        import: &ImportRef,
        bindings: &mut HashMap<String, Binding>,
        wildcards: &mut Vec<usize>,
    ) -> Vec<usize> {
        let Some(segments) = python_module_segments(&file.relative_path, import) else {
            return Vec::new();
        };
        let module = self.python_module(&segments, import.is_relative);
        let mut targets: Vec<usize> = module.into_iter().collect();

        if import.imported_names.is_empty() {
            if let Some(m) = module {
                if import.is_wildcard {
                    wildcards.push(m);
                } else {
                    let local = import
                        .alias
                        .clone()
                        .unwrap_or_else(|| import.module_path.clone());
                    bindings.insert(local, Binding::Module(m));
                }
            }
            return targets;
        }

        for imported in &import.imported_names {
            let mut sub = segments.clone();
            sub.push(imported.name.clone());
            let local = imported.local_name().to_string();
            if let Some(submodule) = self.python_module(&sub, import.is_relative) {
                bindings.insert(local, Binding::Module(submodule));
                targets.push(submodule);
            } else if let Some(m) = module {
                bindings.insert(local, Binding::Symbol(m, imported.name.clone()));
            }
        }
        targets
    }

    /// `a/b.py` or `a/b/__init__.py`; absolute modules may also match a
    /// unique path suffix (`src/a/b.py`).
    fn python_module(&self, segments: &[String], relative: bool) -> Option<usize> {
        let joined = segments.join("/");
        let candidates = if joined.is_empty() {
            vec!["__init__.py".to_string()]
        } else {
            vec![format!("{joined}.py"), format!("{joined}/__init__.py")]
        };
        for candidate in &candidates {
            if let Some(&idx) = self.by_path.get(candidate.as_str()) {
                return Some(idx);
            }
        }
        if relative || joined.is_empty() {
            return None;
        }
        let mut matches = candidates
            .iter()
            .filter_map(|c| self.by_suffix.get(c.as_str()))
            .flatten();
        match (matches.next(), matches.next()) {
            (Some(&idx), None) => Some(idx),
            _ => None,
        }
    }

    fn bind_ecmascript(
        &self,
        file: &LinkFile,
        import: &ImportRef,
        bindings: &mut HashMap<String, Binding>,
    ) -> Vec<usize> {
        if !import.is_relative {
            return Vec::new();
        }
        let Some(base) = join_relative(parent_dir(&file.relative_path), &import.module_path)
        else {
            return Vec::new();
        };
        let Some(target) = self.ecmascript_module(&base) else {
            return Vec::new();
        };
        if let Some(alias) = &import.alias {
            bindings.insert(alias.clone(), Binding::Module(target));
        }
        for imported in &import.imported_names {
            bindings.insert(
                imported.local_name().to_string(),
                Binding::Symbol(target, imported.name.clone()),
            );
        }
        vec![target]
    }

    fn ecmascript_module(&self, base: &str) -> Option<usize> {
        if let Some(&idx) = self.by_path.get(base) {
            return Some(idx);
        }
        ECMA_EXTENSIONS
            .iter()
            .map(|ext| format!("{base}{ext}"))
            .chain(ECMA_EXTENSIONS.iter().map(|ext| {
                if base.is_empty() {
                    format!("index{ext}")
                } else {
                    format!("{base}/index{ext}")
                }
            }))
            .find_map(|candidate| self.by_path.get(candidate.as_str()).copied())
    }
}

/// Module path as directory segments, relative imports anchored at the
/// importing file's package.
fn python_module_segments(from_path: &str, import: &ImportRef) -> Option<Vec<String>> {
    let path = import.module_path.as_str();
    let dots = path.chars().take_while(|&c| c == '.').count();
    let rest = &path[dots..];
    let mut segments: Vec<String> = Vec::new();

    if import.is_relative || dots > 0 {
        segments = split_dir(parent_dir(from_path));
        for _ in 1..dots {
            segments.pop()?;
        }
    }
    segments.extend(rest.split('.').filter(|s| !s.is_empty()).map(str::to_string));
    Some(segments)
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn split_dir(dir: &str) -> Vec<String> {
    dir.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve `./x` / `../y` against `dir`; `None` when it climbs above the root.
fn join_relative(dir: &str, spec: &str) -> Option<String> {
    let mut parts = split_dir(dir);
    for segment in spec.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other.to_string()),
        }
    }
    Some(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

struct CallContext<'a> {
    files: &'a [LinkFile],
    indexes: &'a [FileIndex],
    file_idx: usize,
    bindings: &'a HashMap<String, Binding>,
    wildcards: &'a [usize],
}

impl CallContext<'_> {
    fn resolve(&self, call: &CallSite, caller: usize) -> Option<(usize, usize)> {
        let here = self.file_idx;
        let local = &self.indexes[here];

        let Some(receiver) = call.receiver.as_deref() else {
            return match self.bindings.get(&call.callee) {
                Some(Binding::Symbol(target, name)) => self.lookup(*target, name),
                Some(Binding::Module(_)) => None,
                None => self
                    .wildcards
                    .iter()
                    .find_map(|&t| self.indexes[t].unique_top_level(&call.callee).map(|s| (t, s)))
                    .or_else(|| local.unique_top_level(&call.callee).map(|s| (here, s))),
            };
        };

        if receiver == "self" || receiver == "this" {
            let owner = self.files[here].symbols[caller].key();
            let (class, _) = owner.rsplit_once('.')?;
            return self.lookup(here, &format!("{class}.{}", call.callee));
        }

        match self.bindings.get(receiver) {
            Some(Binding::Module(target)) => self.lookup(*target, &call.callee),
            Some(Binding::Symbol(target, name)) => {
                self.lookup(*target, &format!("{name}.{}", call.callee))
            }
            None => self.lookup(here, &format!("{receiver}.{}", call.callee)),
        }
    }

    fn lookup(&self, file: usize, key: &str) -> Option<(usize, usize)> {
        self.indexes[file].by_key.get(key).map(|&sym| (file, sym))
    }
}
