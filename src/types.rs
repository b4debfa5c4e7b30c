//! Core domain types for the repository knowledge graph.
//!
//! A build produces [`GraphNode`]s whose payload is one of three variants
//! (file/directory, code symbol, text chunk) plus typed [`GraphEdge`]s
//! between them. Everything here is plain data and serializes with serde so
//! the store and the CLI can persist or print it without extra glue.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Source languages recognised by extension.
///
/// Recognition does not imply symbol extraction: only languages with a
/// registered adapter produce symbols, the rest get a bare file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Rust,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Kotlin,
    Php,
    Bash,
    Sql,
    Swift,
    Scala,
}

impl Language {
    /// Map a file extension (including the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".py" => Some(Self::Python),
            ".js" | ".mjs" | ".cjs" => Some(Self::JavaScript),
            ".jsx" => Some(Self::Jsx),
            ".ts" | ".mts" | ".cts" => Some(Self::TypeScript),
            ".tsx" => Some(Self::Tsx),
            ".rs" => Some(Self::Rust),
            ".go" => Some(Self::Go),
            ".java" => Some(Self::Java),
            ".c" | ".h" => Some(Self::C),
            ".cpp" | ".cc" | ".cxx" | ".hpp" | ".hh" => Some(Self::Cpp),
            ".cs" => Some(Self::CSharp),
            ".rb" => Some(Self::Ruby),
            ".kt" | ".kts" => Some(Self::Kotlin),
            ".php" => Some(Self::Php),
            ".sh" | ".bash" => Some(Self::Bash),
            ".sql" => Some(Self::Sql),
            ".swift" => Some(Self::Swift),
            ".scala" => Some(Self::Scala),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Kotlin => "kotlin",
            Self::Php => "php",
            Self::Bash => "bash",
            Self::Sql => "sql",
            Self::Swift => "swift",
            Self::Scala => "scala",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "typescript" | "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "rust" | "rs" => Some(Self::Rust),
            "go" | "golang" => Some(Self::Go),
            "java" => Some(Self::Java),
            "c" => Some(Self::C),
            "cpp" | "c++" => Some(Self::Cpp),
            "csharp" | "c#" | "cs" => Some(Self::CSharp),
            "ruby" | "rb" => Some(Self::Ruby),
            "kotlin" | "kt" => Some(Self::Kotlin),
            "php" => Some(Self::Php),
            "bash" | "sh" | "shell" => Some(Self::Bash),
            "sql" => Some(Self::Sql),
            "swift" => Some(Self::Swift),
            "scala" => Some(Self::Scala),
            _ => None,
        }
    }

    /// Languages whose imports resolve like ECMAScript modules.
    pub fn is_ecmascript(&self) -> bool {
        matches!(
            self,
            Self::JavaScript | Self::Jsx | Self::TypeScript | Self::Tsx
        )
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SymbolKind
// ---------------------------------------------------------------------------

/// Kinds of code symbols an adapter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Struct,
    Trait,
    Impl,
    Module,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Enum => "enum",
            Self::Struct => "struct",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::Module => "module",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "function" | "fn" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "type_alias" | "type" => Some(Self::TypeAlias),
            "enum" => Some(Self::Enum),
            "struct" => Some(Self::Struct),
            "trait" => Some(Self::Trait),
            "impl" => Some(Self::Impl),
            "module" | "mod" => Some(Self::Module),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EdgeKind
// ---------------------------------------------------------------------------

/// Relationship vocabulary of the graph. Downstream consumers match on these
/// exact names, so the wire strings never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Directory → child directory or file.
    ContainsPath,
    /// File → every symbol defined in it.
    DefinesSymbol,
    /// File → every text chunk cut from it.
    ContainsText,
    /// Text chunk → following chunk of the same file.
    NextChunk,
    /// Symbol → directly nested symbol.
    ContainsSymbol,
    /// Symbol → symbol it (probably) calls.
    Calls,
    /// File → file it imports.
    Imports,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 7] = [
        Self::ContainsPath,
        Self::DefinesSymbol,
        Self::ContainsText,
        Self::NextChunk,
        Self::ContainsSymbol,
        Self::Calls,
        Self::Imports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContainsPath => "CONTAINS_PATH",
            Self::DefinesSymbol => "DEFINES_SYMBOL",
            Self::ContainsText => "CONTAINS_TEXT",
            Self::NextChunk => "NEXT_CHUNK",
            Self::ContainsSymbol => "CONTAINS_SYMBOL",
            Self::Calls => "CALLS",
            Self::Imports => "IMPORTS",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CONTAINS_PATH" => Some(Self::ContainsPath),
            "DEFINES_SYMBOL" => Some(Self::DefinesSymbol),
            "CONTAINS_TEXT" => Some(Self::ContainsText),
            "NEXT_CHUNK" => Some(Self::NextChunk),
            "CONTAINS_SYMBOL" => Some(Self::ContainsSymbol),
            "CALLS" => Some(Self::Calls),
            "IMPORTS" => Some(Self::Imports),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node payloads
// ---------------------------------------------------------------------------

/// A file or directory. The repository root is `relative_path == "."`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub basename: String,
    pub relative_path: String,
}

/// A code symbol with both identities resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub kind: SymbolKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    pub language: Language,
    pub relative_path: String,
    /// 1-indexed, inclusive.
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Only feeds the fingerprint; never persisted.
    #[serde(skip)]
    pub node_types: Vec<String>,
    pub version_id: String,
    pub stable_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl SymbolEntry {
    /// `qualified_name` when present, else the bare name.
    pub fn display_name(&self) -> &str {
        self.qualified_name.as_deref().unwrap_or(&self.name)
    }
}

/// A slice of a documentation file. Lines are 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunkEntry {
    pub text: String,
    pub start_line: u32,
    pub end_line: u32,
    pub position: u32,
}

/// The three node payload variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodePayload {
    File(FileEntry),
    Symbol(SymbolEntry),
    Text(TextChunkEntry),
}

impl NodePayload {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Symbol(_) => "symbol",
            Self::Text(_) => "text",
        }
    }
}

// ---------------------------------------------------------------------------
// GraphNode / GraphEdge
// ---------------------------------------------------------------------------

/// A node in one build's id space. `node_id` is only unique per repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub node_id: String,
    pub payload: NodePayload,
}

impl GraphNode {
    pub fn new(node_id: u64, payload: NodePayload) -> Self {
        Self {
            node_id: node_id.to_string(),
            payload,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match &self.payload {
            NodePayload::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&SymbolEntry> {
        match &self.payload {
            NodePayload::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextChunkEntry> {
        match &self.payload {
            NodePayload::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Build statistics
// ---------------------------------------------------------------------------

/// Classification of a non-fatal, per-file fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexErrorKind {
    FileSystem,
    Extraction,
    SizeLimitExceeded,
    HierarchyInvariantViolation,
}

impl IndexErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileSystem => "file_system",
            Self::Extraction => "extraction",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::HierarchyInvariantViolation => "hierarchy_invariant_violation",
        }
    }
}

impl std::fmt::Display for IndexErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded per-file fault: `(path, message)` plus its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexError {
    pub path: String,
    pub kind: IndexErrorKind,
    pub message: String,
}

impl IndexError {
    pub fn new(path: impl Into<String>, kind: IndexErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Aggregate counters for one build.
///
/// Every file entry the walker meets ends up in exactly one of
/// `indexed_files` / `skipped_files`, so the two always sum to `total_files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub total_files: usize,
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_directories: usize,
    pub skipped_directories: usize,
    pub total_symbols: usize,
    pub truncated_symbols: usize,
    pub total_text_chunks: usize,
    pub large_files_batched: usize,
    pub symbol_batches_processed: usize,
    pub hierarchy_violations: usize,
    pub imports_resolved: usize,
    pub calls_resolved: usize,
    pub errors: Vec<IndexError>,
}

impl BuildStats {
    pub fn record_error(
        &mut self,
        path: impl Into<String>,
        kind: IndexErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(IndexError::new(path, kind, message));
    }

    /// Add another accumulator's counters and errors into this one.
    pub fn merge(&mut self, other: BuildStats) {
        self.total_files += other.total_files;
        self.indexed_files += other.indexed_files;
        self.skipped_files += other.skipped_files;
        self.failed_files += other.failed_files;
        self.total_directories += other.total_directories;
        self.skipped_directories += other.skipped_directories;
        self.total_symbols += other.total_symbols;
        self.truncated_symbols += other.truncated_symbols;
        self.total_text_chunks += other.total_text_chunks;
        self.large_files_batched += other.large_files_batched;
        self.symbol_batches_processed += other.symbol_batches_processed;
        self.hierarchy_violations += other.hierarchy_violations;
        self.imports_resolved += other.imports_resolved;
        self.calls_resolved += other.calls_resolved;
        self.errors.extend(other.errors);
    }

    /// Errors as plain `(path, message)` pairs.
    pub fn error_pairs(&self) -> Vec<(&str, &str)> {
        self.errors
            .iter()
            .map(|e| (e.path.as_str(), e.message.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BuildResult
// ---------------------------------------------------------------------------

/// Everything one build produced. `nodes` includes `root_node` at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub root_node: GraphNode,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: BuildStats,
}

impl BuildResult {
    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        // Ids are dense and assigned in order, so the id is the index.
        node_id
            .parse::<usize>()
            .ok()
            .and_then(|i| self.nodes.get(i))
            .filter(|n| n.node_id == node_id)
            .or_else(|| self.nodes.iter().find(|n| n.node_id == node_id))
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&GraphNode, &SymbolEntry)> {
        self.nodes
            .iter()
            .filter_map(|n| n.as_symbol().map(|s| (n, s)))
    }

    /// Find a file/directory node by its relative path.
    pub fn file_node(&self, relative_path: &str) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|n| n.as_file().is_some_and(|f| f.relative_path == relative_path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(".py", Language::Python ; "ext_py")]
    #[test_case(".js", Language::JavaScript ; "ext_js")]
    #[test_case(".mjs", Language::JavaScript ; "ext_mjs")]
    #[test_case(".jsx", Language::Jsx ; "ext_jsx")]
    #[test_case(".ts", Language::TypeScript ; "ext_ts")]
    #[test_case(".tsx", Language::Tsx ; "ext_tsx")]
    #[test_case(".rs", Language::Rust ; "ext_rs")]
    #[test_case(".go", Language::Go ; "ext_go")]
    #[test_case(".java", Language::Java ; "ext_java")]
    #[test_case(".h", Language::C ; "ext_h")]
    #[test_case(".hpp", Language::Cpp ; "ext_hpp")]
    #[test_case(".sh", Language::Bash ; "ext_sh")]
    #[test_case(".sql", Language::Sql ; "ext_sql")]
    fn from_extension_maps_correctly(ext: &str, expected: Language) {
        assert_eq!(Language::from_extension(ext), Some(expected));
    }

    #[test_case(".md" ; "markdown_is_not_code")]
    #[test_case(".txt" ; "text_is_not_code")]
    #[test_case(".json" ; "json")]
    #[test_case("" ; "empty")]
    fn from_extension_rejects_non_code(ext: &str) {
        assert_eq!(Language::from_extension(ext), None);
    }

    #[test]
    fn language_as_str_roundtrips() {
        for lang in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Rust,
            Language::CSharp,
        ] {
            assert_eq!(Language::from_str_loose(lang.as_str()), Some(lang));
            assert_eq!(lang.to_string(), lang.as_str());
        }
    }

    #[test_case(IndexErrorKind::FileSystem, "file_system" ; "file_system")]
    #[test_case(IndexErrorKind::Extraction, "extraction" ; "extraction")]
    #[test_case(IndexErrorKind::SizeLimitExceeded, "size_limit_exceeded" ; "size_limit")]
    #[test_case(
        IndexErrorKind::HierarchyInvariantViolation,
        "hierarchy_invariant_violation" ;
        "hierarchy"
    )]
    fn index_error_kind_names_match_serde(kind: IndexErrorKind, name: &str) {
        assert_eq!(kind.as_str(), name);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{name}\""));
    }

    #[test]
    fn edge_kind_wire_names_are_stable() {
        let names: Vec<&str> = EdgeKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "CONTAINS_PATH",
                "DEFINES_SYMBOL",
                "CONTAINS_TEXT",
                "NEXT_CHUNK",
                "CONTAINS_SYMBOL",
                "CALLS",
                "IMPORTS",
            ]
        );
        for kind in EdgeKind::ALL {
            assert_eq!(EdgeKind::from_str_loose(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn edge_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&EdgeKind::ContainsSymbol).unwrap();
        assert_eq!(json, "\"CONTAINS_SYMBOL\"");
    }

    #[test]
    fn symbol_kind_roundtrip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::TypeAlias,
            SymbolKind::Impl,
        ] {
            assert_eq!(SymbolKind::from_str_loose(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let node = GraphNode::new(
            3,
            NodePayload::File(FileEntry {
                basename: "src".into(),
                relative_path: "src".into(),
            }),
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["node_id"], "3");
        assert_eq!(json["payload"]["type"], "file");
        assert_eq!(json["payload"]["relative_path"], "src");
    }

    #[test]
    fn stats_error_pairs() {
        let mut stats = BuildStats::default();
        stats.record_error("a/b.py", IndexErrorKind::Extraction, "boom");
        assert_eq!(stats.error_pairs(), vec![("a/b.py", "boom")]);
    }
}
