//! Symbol extraction adapters.
//!
//! An adapter turns a parsed tree into a flat, ordered list of
//! [`RawSymbol`]s. Each adapter owns its language's scoping rules (what
//! counts as a method, how qualified names are joined) and its node-type
//! canonicalisation. Nothing downstream inspects the syntax tree again.
//!
//! Adapters may also report import statements and call sites
//! ([`FileReferences`]) from the same parse; the linker turns those into
//! best-effort `IMPORTS` / `CALLS` edges.

pub mod ecmascript;
pub mod python;
pub mod rust;

use std::collections::HashMap;
use std::sync::Arc;

use tree_sitter::{Node, Tree};

use crate::error::{RepoGraphError, Result};
use crate::types::{Language, SymbolKind};

pub use ecmascript::EcmaScriptExtractor;
pub use python::PythonExtractor;
pub use rust::RustExtractor;

/// Deepest definition nesting an adapter walks before giving up on a file.
pub const MAX_WALK_DEPTH: usize = 100;

// ---------------------------------------------------------------------------
// Adapter output
// ---------------------------------------------------------------------------

/// A symbol as reported by an adapter, before identities are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSymbol {
    pub kind: SymbolKind,
    pub name: String,
    pub qualified_name: Option<String>,
    /// 1-indexed, inclusive.
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub signature: String,
    pub docstring: Option<String>,
    /// Canonical node-type sequence: named nodes, pre-order, no comments.
    pub node_types: Vec<String>,
}

/// One name pulled in by an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// The identifier the importing file uses.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A raw import statement, unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// `pkg.mod`, `..utils`, `./helpers`, `lodash`, ...
    pub module_path: String,
    pub imported_names: Vec<ImportedName>,
    /// Module-level alias (`import x as y`, `import * as y`).
    pub alias: Option<String>,
    pub is_relative: bool,
    pub is_wildcard: bool,
    pub line: u32,
}

/// A call expression, unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: String,
    /// Text of the object a method is called on, if any.
    pub receiver: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReferences {
    pub imports: Vec<ImportRef>,
    pub calls: Vec<CallSite>,
}

impl FileReferences {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.calls.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Uniform symbol extraction over a parsed tree.
pub trait SymbolExtractor: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Symbols in extraction order. Syntax errors are tolerated; failures
    /// such as runaway nesting surface as [`RepoGraphError::Extraction`].
    fn extract_symbols(
        &self,
        tree: &Tree,
        relative_path: &str,
        source: &[u8],
    ) -> Result<Vec<RawSymbol>>;

    /// Imports and call sites. Adapters without reference support report
    /// nothing.
    fn extract_references(&self, _tree: &Tree, _source: &[u8]) -> FileReferences {
        FileReferences::default()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Language → adapter lookup.
#[derive(Clone)]
pub struct ExtractorRegistry {
    adapters: HashMap<Language, Arc<dyn SymbolExtractor>>,
}

impl ExtractorRegistry {
    /// A registry with no adapters: every code file yields zero symbols.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Python, JavaScript/TypeScript and Rust adapters.
    pub fn with_default_adapters() -> Self {
        let mut registry = Self::empty();
        registry.register(Language::Python, Arc::new(PythonExtractor));
        let ecma: Arc<dyn SymbolExtractor> = Arc::new(EcmaScriptExtractor);
        for lang in [
            Language::JavaScript,
            Language::Jsx,
            Language::TypeScript,
            Language::Tsx,
        ] {
            registry.register(lang, Arc::clone(&ecma));
        }
        registry.register(Language::Rust, Arc::new(RustExtractor));
        registry
    }

    pub fn register(&mut self, language: Language, adapter: Arc<dyn SymbolExtractor>) {
        self.adapters.insert(language, adapter);
    }

    pub fn get(&self, language: Language) -> Option<&dyn SymbolExtractor> {
        self.adapters.get(&language).map(|a| a.as_ref())
    }

    pub fn supports(&self, language: Language) -> bool {
        self.adapters.contains_key(&language)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_default_adapters()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut langs: Vec<&str> = self.adapters.keys().map(|l| l.as_str()).collect();
        langs.sort_unstable();
        f.debug_struct("ExtractorRegistry")
            .field("languages", &langs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for adapters
// ---------------------------------------------------------------------------

pub(crate) fn node_text(node: Node<'_>, source: &[u8]) -> String {
    String::from_utf8_lossy(&source[node.byte_range()]).into_owned()
}

pub(crate) fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field).map(|n| node_text(n, source))
}

pub(crate) fn line_of(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// Error-recovery nodes. Adapters skip these subtrees and keep walking
/// their siblings, so one broken statement costs only itself.
pub(crate) fn is_damaged(node: Node<'_>) -> bool {
    node.is_error() || node.is_missing()
}

pub(crate) fn depth_error(relative_path: &str, depth: usize) -> RepoGraphError {
    RepoGraphError::Extraction {
        path: relative_path.to_string(),
        message: format!("definition nesting depth {depth} exceeds {MAX_WALK_DEPTH}"),
    }
}

/// Named node kinds of `node`'s subtree in pre-order, comments dropped.
///
/// Walks with a cursor so pathological trees cannot exhaust the stack.
pub(crate) fn canonical_node_types(node: Node<'_>) -> Vec<String> {
    let mut types = Vec::new();
    let mut cursor = node.walk();
    let mut descend = true;
    loop {
        let current = cursor.node();
        let is_comment = current.is_extra() || current.kind().contains("comment");
        if descend {
            if current.is_named() && !is_comment {
                types.push(current.kind().to_string());
            }
            if !is_comment && cursor.goto_first_child() {
                continue;
            }
        }
        if cursor.node() == node {
            break;
        }
        if cursor.goto_next_sibling() {
            descend = true;
            continue;
        }
        if !cursor.goto_parent() || cursor.node() == node {
            break;
        }
        descend = false;
    }
    types
}

/// Visit every node of the tree in pre-order.
pub(crate) fn walk_tree<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Declaration header: the first line, continued while it ends in `(` or
/// `,` (up to ten lines), whitespace-trimmed and joined with spaces.
pub(crate) fn signature(node: Node<'_>, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = node.end_byte().min(source.len());
    let text = String::from_utf8_lossy(&source[start..end]);
    let mut lines = text.lines();

    let Some(first) = lines.next() else {
        return String::new();
    };
    let first = first.trim();
    if !(first.ends_with('(') || first.ends_with(',')) {
        return first.to_string();
    }

    let mut parts = vec![first.to_string()];
    for line in lines.take(9) {
        let line = line.trim();
        parts.push(line.to_string());
        if line.ends_with(':') || line.ends_with('{') || line.contains("):") || line.contains(") {")
        {
            break;
        }
    }
    parts.join(" ")
}

/// Build a [`RawSymbol`] from a definition node.
pub(crate) fn raw_symbol(
    node: Node<'_>,
    kind: SymbolKind,
    name: String,
    qualified_name: Option<String>,
    docstring: Option<String>,
    source: &[u8],
) -> RawSymbol {
    RawSymbol {
        kind,
        name,
        qualified_name,
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        signature: signature(node, source),
        docstring,
        node_types: canonical_node_types(node),
    }
}

/// `Parent.name`, or just `name` at the top level.
pub(crate) fn qualify(scope: &[String], name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope.join("."), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::CodeParser;

    #[test]
    fn default_registry_covers_shipped_adapters() {
        let registry = ExtractorRegistry::default();
        for lang in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Rust,
        ] {
            assert!(registry.supports(lang), "{lang} should have an adapter");
        }
        assert!(!registry.supports(Language::Go));
        assert!(ExtractorRegistry::empty().get(Language::Python).is_none());
    }

    #[test]
    fn canonical_node_types_skip_comments() {
        let parser = CodeParser::new();
        let plain = parser
            .parse(b"def f(x):\n    return x\n", Language::Python)
            .unwrap();
        let commented = parser
            .parse(
                b"def f(x):\n    # explain\n    return x  # trailing\n",
                Language::Python,
            )
            .unwrap();
        let a = canonical_node_types(plain.root_node());
        let b = canonical_node_types(commented.root_node());
        assert_eq!(a, b);
        assert_eq!(a.first().map(String::as_str), Some("module"));
        assert!(a.iter().any(|t| t == "function_definition"));
    }

    #[test]
    fn canonical_node_types_of_subtree_stay_inside_it() {
        let parser = CodeParser::new();
        let tree = parser
            .parse(b"def f():\n    pass\n\ndef g():\n    return 1\n", Language::Python)
            .unwrap();
        let first_def = tree.root_node().named_child(0).unwrap();
        let types = canonical_node_types(first_def);
        assert_eq!(types[0], "function_definition");
        assert!(!types.iter().any(|t| t == "return_statement"));
    }

    #[test]
    fn walk_tree_visits_every_node_once() {
        let tree = CodeParser::new()
            .parse(b"x = 1\ny = 2\n", Language::Python)
            .unwrap();
        let mut count = 0usize;
        walk_tree(tree.root_node(), |_| count += 1);
        fn size(node: Node<'_>) -> usize {
            let mut cursor = node.walk();
            1 + node.children(&mut cursor).map(size).sum::<usize>()
        }
        assert_eq!(count, size(tree.root_node()));
    }

    #[test]
    fn signature_continues_open_parameter_lists() {
        let src = b"def long(\n    a,\n    b,\n):\n    pass\n";
        let tree = CodeParser::new().parse(src, Language::Python).unwrap();
        let def = tree.root_node().named_child(0).unwrap();
        assert_eq!(signature(def, src), "def long( a, b, ):");
    }

    #[test]
    fn error_nodes_are_damaged() {
        let tree = CodeParser::new()
            .parse(b"def ok():\n    pass\n\nx = (1,\n", Language::Python)
            .unwrap();
        let root = tree.root_node();
        assert!(root.has_error());
        let mut damaged = 0usize;
        walk_tree(root, |node| damaged += usize::from(is_damaged(node)));
        assert!(damaged > 0);
        assert!(!is_damaged(root.named_child(0).unwrap()));
    }

    #[test]
    fn qualify_joins_scope() {
        assert_eq!(qualify(&[], "f"), "f");
        assert_eq!(qualify(&["A".into(), "B".into()], "f"), "A.B.f");
    }
}
